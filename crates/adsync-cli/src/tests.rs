use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["adsync"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_run_with_requests_file() {
    let cli = Cli::try_parse_from(["adsync", "run", "--requests", "batch.yaml"])
        .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Run { requests }) => assert_eq!(requests, PathBuf::from("batch.yaml")),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn run_requires_requests_file() {
    assert!(Cli::try_parse_from(["adsync", "run"]).is_err());
}

#[test]
fn parses_rate_command() {
    let cli = Cli::try_parse_from(["adsync", "rate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Rate)));
}

#[test]
fn parses_sheet_list() {
    let cli = Cli::try_parse_from(["adsync", "sheet", "list", "--spreadsheet-id", "abc"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Sheet {
            command: SheetCommands::List { ref spreadsheet_id }
        }) if spreadsheet_id == "abc"
    ));
}

#[test]
fn parses_sheet_select() {
    let cli = Cli::try_parse_from(["adsync", "sheet", "select", "--sheet-name", "Stats"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Sheet {
            command: SheetCommands::Select { ref sheet_name }
        }) if sheet_name == "Stats"
    ));
}

#[test]
fn parses_sheet_columns_with_optional_metrics() {
    let cli = Cli::try_parse_from([
        "adsync", "sheet", "columns", "--date", "Updated", "--spent", "Spent", "--clicks", "Clicks",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Sheet {
            command: SheetCommands::Columns(choice),
        }) => {
            assert_eq!(choice.date, "Updated");
            assert_eq!(choice.spent.as_deref(), Some("Spent"));
            assert_eq!(choice.clicks.as_deref(), Some("Clicks"));
            assert!(choice.impressions.is_none());
            assert!(choice.reach.is_none());
            assert!(choice.result.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn sheet_columns_requires_date_column() {
    assert!(Cli::try_parse_from(["adsync", "sheet", "columns", "--spent", "Spent"]).is_err());
}

#[test]
fn parses_sheet_show() {
    let cli = Cli::try_parse_from(["adsync", "sheet", "show"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Sheet {
            command: SheetCommands::Show
        })
    ));
}
