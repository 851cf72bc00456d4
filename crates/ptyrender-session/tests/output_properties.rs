//! Property-based tests for the output buffer.

use proptest::prelude::*;

use ptyrender_session::OutputBuffer;

fn appends() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z\u{e9}\u{4e2d}\n ]{0,40}", 0..50)
}

proptest! {
    /// Size never exceeds capacity and contents match the reported size.
    #[test]
    fn size_stays_within_capacity(max_size in 1usize..128, texts in appends()) {
        let mut buffer = OutputBuffer::new(max_size);
        for text in &texts {
            let appended = buffer.append(text);
            prop_assert!(appended.text.len() <= max_size);
            prop_assert!(buffer.current_size() <= max_size);
            prop_assert_eq!(buffer.contents().len(), buffer.current_size());
        }
    }

    /// Once truncated, always truncated.
    #[test]
    fn truncation_is_monotonic(max_size in 1usize..64, texts in appends()) {
        let mut buffer = OutputBuffer::new(max_size);
        let mut seen_truncation = false;
        for text in &texts {
            let appended = buffer.append(text);
            if seen_truncation {
                prop_assert!(appended.truncated);
            }
            seen_truncation |= appended.truncated;
            prop_assert_eq!(appended.truncated, buffer.is_truncated());
        }
    }

    /// The retained contents are always a suffix of everything appended.
    #[test]
    fn contents_are_a_suffix(max_size in 1usize..64, texts in appends()) {
        let mut buffer = OutputBuffer::new(max_size);
        let mut everything = String::new();
        for text in &texts {
            buffer.append(text);
            everything.push_str(text);
            prop_assert!(everything.ends_with(&buffer.contents()));
        }
        if everything.len() <= max_size {
            prop_assert!(!buffer.is_truncated());
            prop_assert_eq!(buffer.contents(), everything);
        }
    }
}
