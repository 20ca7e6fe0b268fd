use edit_distance::edit_distance;

/// True if every character of `word` appears in `candidate`, in order.
fn is_subsequence(word: &str, candidate: &str) -> bool {
    let mut rest = candidate.chars();

    word.chars().all(|c| rest.any(|other| other == c))
}

/// Picks the candidate closest to `word`, if any is close enough to be a plausible typo.
///
/// Candidates at the same distance are ranked by whether they contain `word` with only
/// letters dropped, then by table order.
pub(crate) fn closest<'a, I>(word: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let word = word.to_uppercase();
    let limit = std::cmp::max(1, word.len() / 3);

    candidates
        .into_iter()
        .map(|candidate| {
            let upper = candidate.to_uppercase();
            let distance = edit_distance(&word, &upper);

            (distance, !is_subsequence(&word, &upper), candidate)
        })
        .filter(|(distance, _, _)| *distance <= limit)
        .min_by_key(|(distance, dropped, _)| (*distance, *dropped))
        .map(|(_, _, candidate)| candidate)
}

#[test]
fn test_closest() {
    let words = ["ADD", "ADDI", "SUB", "HALT"];

    assert_eq!(closest("ADDD", words.iter().copied()), Some("ADD"));
    assert_eq!(closest("hlt", words.iter().copied()), Some("HALT"));
    assert_eq!(closest("XYZZY", words.iter().copied()), None);
}

#[test]
fn test_closest_prefers_dropped_letters_on_tie() {
    let words = ["JMP", "JLT", "JGE", "HALT"];

    assert_eq!(closest("HLT", words.iter().copied()), Some("HALT"));
    assert_eq!(closest("jlt", words.iter().copied()), Some("JLT"));
}
