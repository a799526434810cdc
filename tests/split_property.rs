//! Where segment boundaries fall must never change what is decoded.

use linepipe::testing::{ChunkedReader, render_file, sample_contacts, sample_profiles};
use linepipe::{FakeName, LinePipeline, ParseConfig, SchemaKind};
use quickcheck::QuickCheck;

fn read_sizes(len: usize, splits: &[usize]) -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut remaining = len;
    for s in splits {
        if remaining == 0 {
            break;
        }
        let size = 1 + (s % remaining);
        sizes.push(size);
        remaining -= size;
    }
    sizes
}

fn decode(data: Vec<u8>, sizes: Vec<usize>, config: ParseConfig) -> Option<Vec<FakeName>> {
    let reader = ChunkedReader::new(data, sizes);
    let mut out = Vec::new();
    LinePipeline::from_reader(reader, config).ok()?.run(&mut out).ok()?;
    Some(out)
}

#[test]
fn arbitrary_splits_decode_identically() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(splits: Vec<usize>, segment: u8, capacity: u8, crlf: bool) -> bool {
        let (kind, expected) = if crlf {
            (SchemaKind::Profiles, sample_profiles(12))
        } else {
            (SchemaKind::Contacts, sample_contacts(12))
        };
        let data = render_file(kind, &expected);
        let sizes = read_sizes(data.len(), &splits);
        let config = ParseConfig::for_schema(kind)
            .with_pipe(1 + usize::from(segment % 96), 1 + usize::from(capacity % 4));
        decode(data, sizes, config).is_some_and(|got| got == expected)
    }

    QuickCheck::new()
        .tests(300)
        .quickcheck(prop as fn(Vec<usize>, u8, u8, bool) -> bool);
}

#[test]
fn stack_threshold_does_not_change_records() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(splits: Vec<usize>, threshold: u16) -> bool {
        let expected = sample_contacts(8);
        let data = render_file(SchemaKind::Contacts, &expected);
        let sizes = read_sizes(data.len(), &splits);
        let config = ParseConfig::default()
            .with_pipe(24, 3)
            .with_stack_threshold(usize::from(threshold % 300));
        decode(data, sizes, config).is_some_and(|got| got == expected)
    }

    QuickCheck::new()
        .tests(200)
        .quickcheck(prop as fn(Vec<usize>, u16) -> bool);
}
