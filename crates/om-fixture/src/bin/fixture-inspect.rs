#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use om_fixture::FixtureLoader;
use om_message::{Body, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixtureKind {
    File,
    Message,
    Table,
    Frame,
}

#[derive(Debug, Clone)]
struct CliArgs {
    source: PathBuf,
    kind: FixtureKind,
    name: String,
    as_frame: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("fixture-inspect error: {error}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<(), String> {
    let Some(args) = parse_args()? else {
        print_help();
        return Ok(());
    };
    let loader = FixtureLoader::new(&args.source);
    let path = loader
        .fixture_path(&args.name)
        .map_err(|error| error.to_string())?;
    println!("fixture={}", path.display());

    let msg = match args.kind {
        FixtureKind::File => loader
            .get_file(&args.name)
            .map(|bytes| Message::from_body(Body::Bytes(bytes))),
        FixtureKind::Message => loader.get_message(&args.name),
        FixtureKind::Table => loader.get_msgtable(&args.name),
        FixtureKind::Frame => loader.get_df_message(&args.name),
    }
    .map_err(|error| error.to_string())?;

    if args.as_frame {
        let frame = loader
            .msgtable_to_frame(&msg)
            .map_err(|error| error.to_string())?;
        println!("rows={} columns={}", frame.len(), frame.width());
        println!("{frame}");
    } else {
        println!("{msg}");
    }
    Ok(())
}

fn parse_args() -> Result<Option<CliArgs>, String> {
    let mut source: Option<PathBuf> = None;
    let mut fixture: Option<(FixtureKind, String)> = None;
    let mut as_frame = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let kind = match arg.as_str() {
            "--source" => {
                let value = args.next().ok_or("--source requires an operator source path")?;
                source = Some(PathBuf::from(value));
                continue;
            }
            "--as-frame" => {
                as_frame = true;
                continue;
            }
            "--help" | "-h" => return Ok(None),
            "--file" => FixtureKind::File,
            "--message" => FixtureKind::Message,
            "--table" => FixtureKind::Table,
            "--frame" => FixtureKind::Frame,
            other => return Err(format!("unknown argument: {other}")),
        };
        let name = args
            .next()
            .ok_or_else(|| format!("{arg} requires a fixture file name"))?;
        if fixture.replace((kind, name)).is_some() {
            return Err("pass exactly one of --file, --message, --table, --frame".to_owned());
        }
    }

    let source = source.ok_or("--source is required")?;
    let (kind, name) =
        fixture.ok_or("one of --file, --message, --table, --frame is required")?;
    if as_frame && !matches!(kind, FixtureKind::Table | FixtureKind::Message) {
        return Err("--as-frame only applies to --table and --message fixtures".to_owned());
    }

    Ok(Some(CliArgs {
        source,
        kind,
        name,
        as_frame,
    }))
}

fn print_help() {
    println!(
        "fixture-inspect\n\
         Usage:\n\
         \tfixture-inspect --source <operator source> (--file|--message|--table|--frame) <name> [--as-frame]\n\
         Options:\n\
         \t--source <path>    Operator source file; fixtures resolve under <root>/testdata/<package>/<operator>\n\
         \t--file <name>      Load raw bytes\n\
         \t--message <name>   Load a {{\"attributes\", \"body\"}} json message\n\
         \t--table <name>     Load a csv fixture as a tabular message with a table descriptor\n\
         \t--frame <name>     Load a csv fixture as a whole-table payload\n\
         \t--as-frame         Print the message converted back to a named-column table\n\
         \t-h, --help         Show this help"
    );
}
