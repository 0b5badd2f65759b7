//! Punto de entrada ("driver").
//!
//! Carga el archivo fuente completo, ejecuta el ciclo de compilación
//! sobre stdout y reporta los errores acumulados en stderr.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, ErrorKind};
use lispc::{
    driver::{self, EmitOptions},
    source::Source,
};

use std::{fs::File, io::Read};

const USAGE: &str = "usage: lispc source.lisp";

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = clap::App::new("lispc")
        .version(crate_version!())
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .takes_value(true)
                .multiple_values(true)
                .help("Source file"),
        )
        .arg(
            Arg::new("code-only")
                .short('c')
                .long("code-only")
                .help("Omit the tree of each form"),
        )
        .arg(
            Arg::new("symbols")
                .short('y')
                .long("symbols")
                .help("Dump the symbol table at the end"),
        )
        .try_get_matches();

    let args = match args {
        Ok(args) => args,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => error.exit(),
            _ => {
                println!("{}", USAGE);
                return Ok(());
            }
        },
    };

    // Exactamente un archivo fuente; cualquier otra cosa solo imprime el uso
    let sources: Vec<&str> = args.values_of("source").map(Iterator::collect).unwrap_or_default();
    let path = match sources.as_slice() {
        [path] => *path,
        _ => {
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let mut options = EmitOptions::default();
    if args.is_present("code-only") {
        options.remove(EmitOptions::TREE);
    }

    if args.is_present("symbols") {
        options |= EmitOptions::SYMBOLS;
    }

    let source = load(path)?;

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    let report = driver::run(source, options, &mut stdout).context("Failed to write to stdout")?;

    if !report.diagnostics.is_empty() {
        eprint!("{}", report.diagnostics);
    }

    Ok(())
}

fn load(path: &str) -> anyhow::Result<std::rc::Rc<Source>> {
    let mut file = File::open(path).with_context(|| format!("Cannot open '{}'", path))?;

    let metadata = file
        .metadata()
        .with_context(|| format!("fstat failed: '{}'", path))?;

    if !metadata.is_file() {
        bail!("'{}' isn't a file", path);
    }

    let mut bytes = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read '{}'", path))?;

    Ok(Source::new(path, bytes))
}
