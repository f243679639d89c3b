use std::io::Write;

use proptest::prelude::*;
use optask::stdstreams::Log;

// Bytes from a small alphabet so newlines are frequent.
fn output_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(b'\n'), Just(b'a'), Just(b'b'), Just(b' ')], 0..200)
}

fn expected_lines(bytes: &[u8]) -> Vec<String> {
    let mut lines: Vec<String> = bytes
        .split(|&b| b == b'\n')
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();
    // `split` yields the (possibly empty) tail after the last newline; only a
    // non-empty tail survives a flush.
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

proptest! {
    #[test]
    fn test_chunking_does_not_change_lines(
        bytes in output_strategy(),
        cuts in proptest::collection::vec(any::<usize>(), 0..10),
    ) {
        let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
        cuts.sort();

        let log = Log::new();
        let mut out = log.stdout();
        let mut start = 0;
        for cut in cuts {
            out.write_all(&bytes[start..cut]).unwrap();
            start = cut;
        }
        out.write_all(&bytes[start..]).unwrap();
        log.flush();

        let got: Vec<String> = log.lines().into_iter().map(|l| l.text).collect();
        prop_assert_eq!(got, expected_lines(&bytes));
    }

    #[test]
    fn test_binary_round_trip_law(bytes in output_strategy()) {
        let log = Log::new();
        log.stderr().write_all(&bytes).unwrap();
        log.flush();

        let restored = Log::from_binary(&log.to_binary().unwrap()).unwrap();
        prop_assert_eq!(restored.lines(), log.lines());
    }
}
