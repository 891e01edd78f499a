// tests/classifier.rs
//
// Classifier + dedup over a mixed batch: allowlists hold for every accepted
// item, noise is dropped, and the dedup pass is stable when repeated.

use chrono::{Duration, TimeZone, Utc};

use nfl_status_digest::classify::Classifier;
use nfl_status_digest::dedup::dedupe;
use nfl_status_digest::model::{Category, EntityHints, NormalizedArticle};

fn article(url: &str, title: &str, text: &str, minutes_ago: i64) -> NormalizedArticle {
    let now = Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap();
    NormalizedArticle {
        canonical_url: url.to_string(),
        source: "Test".to_string(),
        title: title.to_string(),
        text: text.to_string(),
        published_at: now - Duration::minutes(minutes_ago),
        hints: EntityHints::default(),
        bullet: None,
    }
}

fn batch() -> Vec<NormalizedArticle> {
    vec![
        article(
            "https://espn.com/nfl/story/1",
            "Bengals WR Chase hurts hamstring",
            "Cincinnati Bengals receiver Ja'Marr Chase left practice with a hamstring injury on Thursday.",
            10,
        ),
        article(
            "https://sports.yahoo.com/nfl/story/2",
            "Jets sign veteran guard",
            "The New York Jets signed veteran guard Mike Onwenu to a one-year contract on Friday.",
            20,
        ),
        article(
            "https://randomblog.example/3",
            "Cowboys release backup quarterback",
            "The Dallas Cowboys released backup quarterback Trey Lance on Friday morning.",
            30,
        ),
        article(
            "https://apnews.com/article/4",
            "Veteran kicker retires",
            "Veteran kicker Matt Prater announced his retirement on Friday after 18 seasons.",
            40,
        ),
        article(
            "https://espn.com/nfl/story/5",
            "Fantasy football: injury winners and losers",
            "Several players were ruled out this week, which changes fantasy lineups.",
            50,
        ),
        article(
            "https://nfl.com/news/6",
            "Eagles place tackle on injured reserve",
            "The Philadelphia Eagles placed tackle Lane Johnson on injured reserve with an ankle injury.",
            60,
        ),
        article(
            "https://espn.com/nfl/story/7",
            "Weekend notebook",
            "Plenty of storylines remain across the league this weekend.",
            70,
        ),
    ]
}

#[test]
fn accepted_items_always_come_from_allowlisted_domains() {
    let clf = Classifier::default();
    let items: Vec<_> = batch().iter().filter_map(|a| clf.classify(a)).collect();

    assert!(!items.is_empty());
    for it in &items {
        assert!(
            clf.rules().allows(it.category, &it.article.domain()),
            "{} accepted under {} from {}",
            it.article.canonical_url,
            it.category,
            it.article.domain()
        );
        assert!(it.fact_bullet.ends_with("(Test)"), "{}", it.fact_bullet);
    }

    let urls: Vec<_> = items.iter().map(|i| i.article.canonical_url.as_str()).collect();
    // Yahoo is not a roster source; the blog is on no list at all
    assert!(!urls.contains(&"https://sports.yahoo.com/nfl/story/2"));
    assert!(!urls.contains(&"https://randomblog.example/3"));
    // fantasy content and vocabulary-free items are noise
    assert!(!urls.contains(&"https://espn.com/nfl/story/5"));
    assert!(!urls.contains(&"https://espn.com/nfl/story/7"));

    let category_of = |url: &str| {
        items
            .iter()
            .find(|i| i.article.canonical_url == url)
            .map(|i| i.category)
    };
    assert_eq!(category_of("https://espn.com/nfl/story/1"), Some(Category::Injury));
    assert_eq!(category_of("https://apnews.com/article/4"), Some(Category::Breaking));
    // injury wins over roster when both vocabularies are present
    assert_eq!(category_of("https://nfl.com/news/6"), Some(Category::Injury));
}

#[test]
fn dedup_is_idempotent_over_classified_batch() {
    let clf = Classifier::default();
    let mut articles = batch();
    // same story re-published a little later
    let mut again = articles[0].clone();
    again.published_at += Duration::minutes(5);
    articles.push(again);

    let items: Vec<_> = articles.iter().filter_map(|a| clf.classify(a)).collect();
    let once = dedupe(items);
    let twice = dedupe(once.clone());
    assert_eq!(once, twice);

    let chase: Vec<_> = once
        .iter()
        .filter(|i| i.article.canonical_url == "https://espn.com/nfl/story/1")
        .collect();
    assert_eq!(chase.len(), 1);
    // the newer copy is the one kept
    assert_eq!(
        chase[0].article.published_at,
        Utc.with_ymd_and_hms(2025, 8, 15, 11, 55, 0).unwrap()
    );
}
