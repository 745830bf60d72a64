use super::*;

#[test]
fn test_record_writes_header_once() {
    let dir = tempfile::tempdir().unwrap();
    let log = CostLog::new(dir.path().join("logs/costs.tsv"));
    let usage = Usage {
        input_tokens: 1000,
        output_tokens: 200,
    };
    log.record("anthropic", "claude-sonnet-4-5-20250929", usage)
        .unwrap();
    log.record("anthropic", "claude-sonnet-4-5-20250929", usage)
        .unwrap();

    let content = std::fs::read_to_string(dir.path().join("logs/costs.tsv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], HEADER);
    let fields: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(fields.len(), 7);
    assert_eq!(fields[1], "anthropic");
    assert_eq!(fields[3], "1000");
    assert_eq!(fields[4], "200");
    assert_eq!(fields[5], "1200");
}

#[test]
fn test_estimate_cost() {
    let usage = Usage {
        input_tokens: 1_000_000,
        output_tokens: 0,
    };
    assert!((estimate_cost_usd("claude-sonnet-4-5", usage) - 3.0).abs() < 1e-9);
    assert_eq!(estimate_cost_usd("unknown-model", usage), 0.0);
}
