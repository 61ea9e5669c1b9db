//! "Did you mean" suggestions for tool names and argument keys.

fn normalize(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn score(input: &str, candidate: &str) -> Option<usize> {
    if input.is_empty() || candidate.is_empty() {
        return None;
    }
    if input == candidate {
        return Some(0);
    }
    if input.contains(candidate) || candidate.contains(input) {
        return Some(1);
    }
    Some(edit_distance(input, candidate))
}

// Short names tolerate one typo, long ones roughly a third of their length.
fn tolerance(normalized_len: usize) -> usize {
    match normalized_len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        n => (n / 3).max(3),
    }
}

pub fn suggest<S: AsRef<str>>(input: &str, candidates: &[S], limit: usize) -> Vec<String> {
    let needle = normalize(input);
    if needle.is_empty() || candidates.is_empty() {
        return Vec::new();
    }
    let allowed = tolerance(needle.len());

    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .map(|c| c.as_ref())
        .filter_map(|candidate| {
            score(&needle, &normalize(candidate))
                .filter(|s| *s <= allowed)
                .map(|s| (s, candidate))
        })
        .collect();
    scored.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.len().cmp(&b.1.len()))
            .then_with(|| a.1.cmp(b.1))
    });
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(limit.max(1))
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::suggest;

    #[test]
    fn suggests_close_tool_names() {
        let tools = ["get_client", "list_clients", "get_contract"];
        let out = suggest("get_clent", &tools, 3);
        assert_eq!(out.first().map(String::as_str), Some("get_client"));
    }

    #[test]
    fn ignores_unrelated_candidates() {
        let tools = ["register_pix", "list_boletos"];
        assert!(suggest("settle_agreement_installment", &tools, 3).is_empty());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(suggest("  ", &["get_batch"], 3).is_empty());
    }
}
