//! Tests for the queue-contract-cli library module.

use super::*;
use queue_contract_core::{QueueError, ValidationFailure, ValidationReport};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("queue-contract").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_cli_parsing() {
    let cli = parse(&["--state-dir", "/tmp/q", "--json-logs", "peek", "--sort", "{\"desc\": []}"]);

    assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/q")));
    assert!(cli.json_logs);
    match cli.command {
        Commands::Peek { sort, filter } => {
            assert_eq!(sort.as_deref(), Some("{\"desc\": []}"));
            assert!(filter.is_none());
        }
        _ => panic!("Expected Peek command"),
    }
}

#[test]
fn test_put_requires_an_item() {
    assert!(Cli::try_parse_from(["queue-contract", "put"]).is_err());
}

#[test]
fn test_commands_map_to_invocations() {
    let cases: Vec<(Vec<&str>, Option<(&str, Vec<&str>)>)> = vec![
        (vec!["init"], Some(("Init", vec![]))),
        (vec!["put", "{}", "{}"], Some(("Put", vec!["{}", "{}"]))),
        (vec!["peek"], Some(("Peek", vec![]))),
        (vec!["peek", "-s", "S"], Some(("Peek", vec!["S"]))),
        (vec!["peek", "-f", "F"], Some(("Peek", vec!["", "F"]))),
        (vec!["peek", "-s", "S", "-f", "F"], Some(("Peek", vec!["S", "F"]))),
        (vec!["update", "P"], Some(("Update", vec!["P"]))),
        (vec!["update", "P", "--filter", "F"], Some(("Update", vec!["P", "F"]))),
        (vec!["add-filter", "even"], Some(("AddFilter", vec!["even"]))),
        (vec!["remove-sort", "desc"], Some(("RemoveSort", vec!["desc"]))),
        (vec!["invoke", "Pop", "a"], Some(("Pop", vec!["a"]))),
        (vec!["config"], None),
        (vec!["extensions"], None),
    ];

    for (args, expected) in cases {
        let actual = parse(&args).command.invocation();
        let expected = expected.map(|(function, args)| {
            (
                function.to_string(),
                args.into_iter().map(String::from).collect::<Vec<_>>(),
            )
        });
        assert_eq!(actual, expected, "command line {:?}", args);
    }
}

#[test]
fn test_exit_codes_distinguish_failures() {
    let usage = CliError::from(DispatchError::MissingArguments { function: "Put" });
    assert_eq!(usage.exit_code(), 4);

    let mut report = ValidationReport::new();
    report.push(ValidationFailure {
        validator: "required:value".to_string(),
        item_index: 0,
        reason: "missing".to_string(),
    });
    let invalid = CliError::from(DispatchError::Queue {
        function: "Put",
        source: QueueError::ValidationFailed(report).within("Put"),
    });
    assert_eq!(invalid.exit_code(), 3);

    let conflict = CliError::from(DispatchError::Queue {
        function: "Peek",
        source: QueueError::from(StateError::Conflict {
            key: "QueueContext".to_string(),
        })
        .within("Peek"),
    });
    assert_eq!(conflict.exit_code(), 5);

    let uninitialized = CliError::from(DispatchError::Queue {
        function: "Peek",
        source: QueueError::NotInitialized,
    });
    assert_eq!(uninitialized.exit_code(), 6);

    let state = CliError::from(StateError::Unavailable {
        message: "disk gone".to_string(),
    });
    assert_eq!(state.exit_code(), 2);
}
