use anyhow::Result;
use linepipe::testing::*;
use linepipe::{
    FieldPolicy, HeaderMatch, LineEnding, LinePipeline, ParseConfig, SchemaKind, parse_file,
    sink_fn,
};
use std::io::Cursor;
use std::ops::ControlFlow;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run_bytes(data: Vec<u8>, config: ParseConfig) -> Result<Vec<linepipe::FakeName>> {
    init_logs();
    let mut out = Vec::new();
    LinePipeline::from_reader(Cursor::new(data), config)?.run(&mut out)?;
    Ok(out)
}

#[test]
fn records_equal_lines_minus_header() -> Result<()> {
    for kind in [SchemaKind::Contacts, SchemaKind::Profiles, SchemaKind::Compact] {
        let expected = sample_records(kind, 250);
        let data = render_file(kind, &expected);
        let line_count = data.iter().filter(|&&b| b == b'\n').count();
        let out = run_bytes(data, ParseConfig::for_schema(kind).with_pipe(64, 4))?;
        assert_eq!(out.len(), line_count - 1, "{kind:?}");
        assert_records_equal(&out, &expected);
    }
    Ok(())
}

#[test]
fn order_is_preserved_across_many_segments() -> Result<()> {
    let expected = sample_contacts(2_000);
    let reader = ChunkedReader::uniform(render_file(SchemaKind::Contacts, &expected), 37);
    let mut out = Vec::new();
    let summary = LinePipeline::from_reader(reader, ParseConfig::default().with_pipe(4096, 3))?
        .run(&mut out)?;
    assert_ids_increasing(&out);
    assert_eq!(out.len(), 2_000);
    assert!(summary.multi_segment_lines > 0);
    Ok(())
}

#[test]
fn terminator_straddling_segments() -> Result<()> {
    let expected = sample_profiles(3);
    let data = render_file(SchemaKind::Profiles, &expected);
    // Split between the '\r' and '\n' of every line.
    let offsets: Vec<usize> = data
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w == b"\r\n")
        .map(|(i, _)| i + 1)
        .collect();
    let reader = ChunkedReader::split_at(data, &offsets);
    let mut out = Vec::new();
    let summary = LinePipeline::from_reader(reader, ParseConfig::for_schema(SchemaKind::Profiles))?
        .run(&mut out)?;
    assert_records_equal(&out, &expected);
    assert_eq!(summary.line_ending, Some(LineEnding::CrLf));
    Ok(())
}

#[test]
fn field_boundary_straddling_segments() -> Result<()> {
    let expected = sample_contacts(4);
    let data = render_file(SchemaKind::Contacts, &expected);
    // Split right after every delimiter.
    let offsets: Vec<usize> = data
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == b';')
        .map(|(i, _)| i + 1)
        .collect();
    let out = {
        let mut out = Vec::new();
        LinePipeline::from_reader(ChunkedReader::split_at(data, &offsets), ParseConfig::default())?
            .run(&mut out)?;
        out
    };
    assert_records_equal(&out, &expected);
    Ok(())
}

#[test]
fn missing_final_newline_is_flushed() -> Result<()> {
    let expected = sample_compact(3);
    let mut data = render_file(SchemaKind::Compact, &expected);
    assert_eq!(data.pop(), Some(b'\n'));
    let out = run_bytes(data, ParseConfig::for_schema(SchemaKind::Compact).with_pipe(8, 2))?;
    assert_records_equal(&out, &expected);
    Ok(())
}

#[test]
fn pool_of_one_segment_never_deadlocks() -> Result<()> {
    let expected = sample_contacts(40);
    let data = render_file(SchemaKind::Contacts, &expected);
    let mut out = Vec::new();
    let summary = LinePipeline::from_reader(Cursor::new(data), ParseConfig::default().with_pipe(7, 1))?
        .run(&mut out)?;
    assert_records_equal(&out, &expected);
    assert!(summary.spills > 0);
    Ok(())
}

#[test]
fn long_lines_use_pooled_buffers() -> Result<()> {
    let mut expected = sample_contacts(3);
    for r in &mut expected {
        r.street_address = Some("x".repeat(1_000));
    }
    let data = render_file(SchemaKind::Contacts, &expected);
    let mut out = Vec::new();
    let summary = LinePipeline::from_reader(Cursor::new(data), ParseConfig::default().with_pipe(64, 64))?
        .run(&mut out)?;
    assert_records_equal(&out, &expected);
    assert_eq!(summary.spills, 0);
    assert!(summary.pooled_copies >= 3);
    Ok(())
}

#[test]
fn stack_and_pooled_materialization_agree() -> Result<()> {
    let expected = sample_contacts(100);
    let data = render_file(SchemaKind::Contacts, &expected);
    let stack = run_bytes(data.clone(), ParseConfig::default().with_pipe(32, 4))?;
    let pooled = run_bytes(data, ParseConfig::default().with_pipe(32, 4).with_stack_threshold(0))?;
    assert_records_equal(&stack, &pooled);
    assert_records_equal(&stack, &expected);
    Ok(())
}

#[test]
fn header_only_and_empty_inputs() -> Result<()> {
    let header = render_file(SchemaKind::Contacts, &[]);
    assert!(run_bytes(header, ParseConfig::default())?.is_empty());
    assert!(run_bytes(Vec::new(), ParseConfig::default())?.is_empty());
    Ok(())
}

#[test]
fn contacts_header_in_comma_form_is_skipped() -> Result<()> {
    let expected = sample_contacts(2);
    let mut data =
        b"Id,Guid,Gender,GivenName,Surname,City,StreetAddress,EmailAddress,Birthday,Domain\n".to_vec();
    let body = render_file(SchemaKind::Contacts, &expected);
    let first_nl = body.iter().position(|&b| b == b'\n').map_or(0, |i| i + 1);
    data.extend_from_slice(&body[first_nl..]);
    assert_records_equal(&run_bytes(data, ParseConfig::default())?, &expected);
    Ok(())
}

#[test]
fn contains_header_match_skips_prefixed_header() -> Result<()> {
    let expected = sample_compact(2);
    let mut data = b"\xEF\xBB\xBF".to_vec();
    data.extend(render_file(SchemaKind::Compact, &expected));
    let config = ParseConfig::for_schema(SchemaKind::Compact);

    let exact = run_bytes(data.clone(), config.clone())?;
    assert_eq!(exact.len(), 3, "BOM-prefixed header decodes as a record under exact match");

    let contains = run_bytes(data, config.with_header_match(HeaderMatch::Contains))?;
    assert_records_equal(&contains, &expected);
    Ok(())
}

#[test]
fn early_stop_reports_partial_run() -> Result<()> {
    let data = render_file(SchemaKind::Contacts, &sample_contacts(500));
    let mut taken = Vec::new();
    let summary = LinePipeline::from_reader(Cursor::new(data), ParseConfig::default().with_pipe(128, 2))?
        .run(sink_fn(|r| {
            taken.push(r);
            if taken.len() == 10 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        }))?;
    assert_eq!(taken.len(), 10);
    assert!(summary.stopped_early);
    assert_records_equal(&taken, &sample_contacts(10));
    Ok(())
}

#[test]
fn lazy_iterator_can_be_dropped_early() -> Result<()> {
    let data = render_file(SchemaKind::Contacts, &sample_contacts(1_000));
    let first: Vec<_> = LinePipeline::from_reader(Cursor::new(data), ParseConfig::default().with_pipe(256, 2))?
        .records()
        .take(5)
        .collect::<Result<_>>()?;
    assert_records_equal(&first, &sample_contacts(5));
    Ok(())
}

#[test]
fn io_failure_aborts_run() -> Result<()> {
    init_logs();
    let data = render_file(SchemaKind::Contacts, &sample_contacts(3));
    let result = LinePipeline::from_reader(FailingReader::after(data), ParseConfig::default())?
        .run(Vec::new());
    let err = result.expect_err("injected failure must surface");
    assert!(format!("{err:#}").contains("injected read failure"));
    Ok(())
}

#[test]
fn missing_file_is_an_error() {
    let err = parse_file("/definitely/not/here.csv", ParseConfig::default()).unwrap_err();
    assert!(format!("{err:#}").contains("open /definitely/not/here.csv"));
}

#[test]
fn parse_file_reads_from_disk() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let expected = sample_profiles(30);
    let path = write_fixture(tmp.path(), "profiles.csv", SchemaKind::Profiles, &expected)?;
    let out = parse_file(&path, ParseConfig::for_schema(SchemaKind::Profiles))?;
    assert_records_equal(&out, &expected);
    Ok(())
}

#[test]
fn lenient_run_counts_defaulted_fields() -> Result<()> {
    let mut data = render_file(SchemaKind::Contacts, &sample_contacts(1));
    data.extend_from_slice(b"zz;7f1b2d3c-1111-2222-3333-444455556666;M;A;B;C;D;E;01/01/2000;f\n");
    let mut out = Vec::new();
    let summary = LinePipeline::from_reader(Cursor::new(data), ParseConfig::default())?.run(&mut out)?;
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].id, 0);
    assert_eq!(summary.fields_defaulted, 1);
    assert_eq!(summary.lines_rejected, 0);
    Ok(())
}

#[test]
fn skip_invalid_drops_and_reports_lines() -> Result<()> {
    let expected = sample_contacts(2);
    let mut data = render_file(SchemaKind::Contacts, &expected[..1]);
    data.extend_from_slice(b"bad line\n");
    let rest = render_file(SchemaKind::Contacts, &expected[1..]);
    let header_len = SchemaKind::Contacts.schema().header().len() + 1;
    data.extend_from_slice(&rest[header_len..]);
    let mut out = Vec::new();
    let summary = LinePipeline::from_reader(
        Cursor::new(data),
        ParseConfig::default().with_field_policy(FieldPolicy::SkipInvalid),
    )?
    .run(&mut out)?;
    assert_records_equal(&out, &expected);
    assert_eq!(summary.lines_rejected, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].line, 3);
    assert_eq!(summary.errors[0].error.field, "Id");
    Ok(())
}

#[test]
fn config_file_drives_the_run() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let expected = sample_profiles(12);
    let data = write_fixture(tmp.path(), "p.csv", SchemaKind::Profiles, &expected)?;
    let cfg_path = tmp.path().join("run.json");
    std::fs::write(
        &cfg_path,
        r#"{ "schema": "profiles", "line_ending": "crlf", "pipe": { "segment_size": 40, "pool_capacity": 2 } }"#,
    )?;
    let config = ParseConfig::from_json_file(&cfg_path)?;
    let summary = LinePipeline::open(&data, config)?.run(Vec::new())?;
    assert_eq!(summary.records, 12);
    assert_eq!(summary.line_ending, Some(LineEnding::CrLf));
    assert_eq!(summary.schema, SchemaKind::Profiles);
    Ok(())
}
