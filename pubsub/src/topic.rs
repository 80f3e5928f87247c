//! AMQP topic pattern matching: `*` is exactly one word, `#` is zero or more.

pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && matches_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && matches_words(rest, &key[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::topic_matches;

    #[test]
    fn star_matches_exactly_one_word() {
        assert!(topic_matches("army_moves.*", "army_moves.alice"));
        assert!(!topic_matches("army_moves.*", "army_moves"));
        assert!(!topic_matches("army_moves.*", "army_moves.alice.extra"));
        assert!(!topic_matches("army_moves.*", "war.alice"));
    }

    #[test]
    fn hash_matches_any_number_of_words() {
        assert!(topic_matches("#", "game_logs.alice"));
        assert!(topic_matches("#", "pause"));
        assert!(topic_matches("war.#", "war"));
        assert!(topic_matches("war.#", "war.alice.bob"));
        assert!(topic_matches("#.alice", "war.alice"));
        assert!(!topic_matches("#.alice", "war.bob"));
    }

    #[test]
    fn literal_words_must_match_exactly() {
        assert!(topic_matches("pause", "pause"));
        assert!(!topic_matches("pause", "pause.alice"));
        assert!(!topic_matches("pause", "paused"));
    }
}
