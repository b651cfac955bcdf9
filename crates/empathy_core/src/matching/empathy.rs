//! Empathy-word aggregation over a set of diaries.

use crate::model::diary::DiaryEntry;
use crate::model::room::EmpathyWord;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Maximum empathy words kept on a room.
pub const ROOM_WORD_LIMIT: usize = 10;

/// Minimum number of diaries that must share a word for a room summary.
pub const ROOM_MIN_FREQUENCY: u32 = 2;

/// Counts, per lower-cased word, how many diaries carry it and their mean
/// importance. A word listed twice by one diary counts once, with the first
/// listed score.
pub fn aggregate_words<'a, I>(diaries: I) -> Vec<EmpathyWord>
where
    I: IntoIterator<Item = &'a DiaryEntry>,
{
    let mut totals: BTreeMap<String, (u32, f64)> = BTreeMap::new();

    for diary in diaries {
        let mut seen = HashSet::new();
        for keyword in &diary.keywords {
            let word = keyword.normalized();
            if word.is_empty() || !seen.insert(word.clone()) {
                continue;
            }
            let entry = totals.entry(word).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += keyword.importance_score;
        }
    }

    totals
        .into_iter()
        .map(|(word, (frequency, score_sum))| EmpathyWord {
            word,
            frequency,
            importance_score: score_sum / f64::from(frequency),
        })
        .collect()
}

/// Room summary: words shared by at least two members, highest mean
/// importance first (ties by word), capped at ten.
pub fn common_empathy_words(members: &[DiaryEntry]) -> Vec<EmpathyWord> {
    let mut words: Vec<_> = aggregate_words(members)
        .into_iter()
        .filter(|word| word.frequency >= ROOM_MIN_FREQUENCY)
        .collect();
    words.sort_by(|left, right| {
        compare_scores(right.importance_score, left.importance_score)
            .then_with(|| left.word.cmp(&right.word))
    });
    words.truncate(ROOM_WORD_LIMIT);
    words
}

/// Digest ordering: most frequent first, then highest importance, then word.
pub fn rank_by_frequency(mut words: Vec<EmpathyWord>, limit: usize) -> Vec<EmpathyWord> {
    words.sort_by(|left, right| {
        right
            .frequency
            .cmp(&left.frequency)
            .then_with(|| compare_scores(right.importance_score, left.importance_score))
            .then_with(|| left.word.cmp(&right.word))
    });
    words.truncate(limit);
    words
}

fn compare_scores(left: f64, right: f64) -> Ordering {
    left.partial_cmp(&right).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::{common_empathy_words, rank_by_frequency, aggregate_words};
    use crate::model::diary::DiaryEntry;
    use crate::model::keyword::Keyword;

    fn diary(keywords: &[(&str, f64)]) -> DiaryEntry {
        DiaryEntry::new(
            Some("t".to_string()),
            keywords
                .iter()
                .map(|(word, score)| Keyword::new(*word, *score))
                .collect(),
            0,
            1,
        )
    }

    #[test]
    fn shared_words_are_averaged_and_sorted_by_importance() {
        let members = vec![
            diary(&[("Rain", 1.0), ("tea", 0.4), ("alone", 1.5)]),
            diary(&[("rain", 0.6), ("tea", 0.8), ("walk", 2.0)]),
        ];

        let words = common_empathy_words(&members);

        let names: Vec<_> = words.iter().map(|word| word.word.as_str()).collect();
        assert_eq!(names, vec!["rain", "tea"]);
        assert_eq!(words[0].frequency, 2);
        assert!((words[0].importance_score - 0.8).abs() < 1e-9);
        assert!((words[1].importance_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn room_summary_is_capped_at_ten_words() {
        let keywords: Vec<(String, f64)> = (0..15)
            .map(|i| (format!("w{i:02}"), f64::from(i) / 10.0))
            .collect();
        let borrowed: Vec<(&str, f64)> = keywords
            .iter()
            .map(|(word, score)| (word.as_str(), *score))
            .collect();
        let members = vec![diary(&borrowed), diary(&borrowed)];

        let words = common_empathy_words(&members);
        assert_eq!(words.len(), 10);
        assert_eq!(words[0].word, "w14");
    }

    #[test]
    fn duplicate_word_in_one_diary_counts_once() {
        let members = vec![diary(&[("rain", 1.0), ("RAIN", 2.0)])];
        let words = aggregate_words(&members);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].frequency, 1);
        assert_eq!(words[0].importance_score, 1.0);
    }

    #[test]
    fn digest_ranks_by_frequency_first() {
        let members = vec![
            diary(&[("rain", 0.1), ("sun", 2.0)]),
            diary(&[("rain", 0.1)]),
        ];
        let ranked = rank_by_frequency(aggregate_words(&members), 20);
        assert_eq!(ranked[0].word, "rain");
        assert_eq!(ranked[1].word, "sun");
    }
}
