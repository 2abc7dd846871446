use std::io::Read;
use std::process::ExitCode;

use tanager::common::source::Source;

/// Reads a program from standard input, compiles it, runs it, and
/// prints the resulting value. Errors go to standard error with an
/// `ERROR: ` prefix and a non-zero exit code.
fn main() -> ExitCode {
    env_logger::init();

    let mut text = String::new();
    if let Err(error) = std::io::stdin().read_to_string(&mut text) {
        eprintln!("ERROR: {}", error);
        return ExitCode::FAILURE;
    }
    let source = Source::source(&text);

    let chunk = match tanager::compile(source) {
        Ok(chunk) => chunk,
        Err(error) => {
            eprintln!("ERROR: {}", error);
            return ExitCode::FAILURE;
        }
    };
    log::debug!("{}", tanager::dump::dump_chunk(&chunk));

    match tanager::run(&chunk) {
        Ok(result) => println!("{}", result),
        Err(error) => {
            eprintln!("ERROR: {}", error);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
