//! Sum-of-lists demo.
//!
//! `*.lst` files hold comma-separated names of `*.dat` files, and each `*.dat`
//! file holds a number. Evaluating a list sums the numbers of the files it names.
//! Every rule prints a line when it runs, so the output shows exactly which
//! work is redone after each change.
//!
//! Run with `RUST_LOG=layer_flow=debug` to also see the engine's own logs.

use anyhow::Context;
use layer_flow::{GraphError, GraphRuntime};
use tracing_subscriber::EnvFilter;

const FILE_CONTENTS: &str = "FILE_CONTENTS";
const PARSE_LST: &str = "PARSE_LST";
const PARSE_DAT: &str = "PARSE_DAT";
const EVALUATE_LST: &str = "EVALUATE_LST";

fn build() -> GraphRuntime {
    GraphRuntime::builder()
        .source::<String>(FILE_CONTENTS)
        .derived(PARSE_LST, |ctx, file| {
            let contents = ctx.get_value::<String>(FILE_CONTENTS, file)?;
            println!("{}({})", PARSE_LST, file);
            Ok(contents
                .split(',')
                .map(str::to_string)
                .collect::<Vec<String>>())
        })
        .derived(PARSE_DAT, |ctx, file| {
            let contents = ctx.get_value::<String>(FILE_CONTENTS, file)?;
            println!("{}({})", PARSE_DAT, file);
            let number = contents
                .trim()
                .parse::<i64>()
                .with_context(|| format!("{} is not a number", file))?;
            Ok(number)
        })
        .derived(EVALUATE_LST, |ctx, file| {
            let list = ctx.get_value::<Vec<String>>(PARSE_LST, file)?;
            let mut numbers = Vec::with_capacity(list.len());
            for item in list.iter() {
                numbers.push(*ctx.get_value::<i64>(PARSE_DAT, item)?);
            }
            println!("{}({})", EVALUATE_LST, file);
            Ok(numbers.iter().sum::<i64>())
        })
        .build()
}

fn evaluate(runtime: &mut GraphRuntime) -> Result<(), GraphError> {
    let sum = runtime.get_value::<i64>(EVALUATE_LST, "main.lst")?;
    println!("=> {}\n", sum);
    Ok(())
}

fn main() -> Result<(), GraphError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut runtime = build();

    runtime.set_input(FILE_CONTENTS, "main.lst", "foo.dat,bar.dat".to_string())?;
    runtime.set_input(FILE_CONTENTS, "foo.dat", "13".to_string())?;
    runtime.set_input(FILE_CONTENTS, "bar.dat", "42".to_string())?;
    // PARSE_LST(main.lst), PARSE_DAT(foo.dat), PARSE_DAT(bar.dat), EVALUATE_LST(main.lst) => 55
    evaluate(&mut runtime)?;

    runtime.set_input(FILE_CONTENTS, "bar.dat", "24".to_string())?;
    // PARSE_DAT(bar.dat), EVALUATE_LST(main.lst) => 37
    evaluate(&mut runtime)?;

    runtime.set_input(FILE_CONTENTS, "bar.dat", "  24  ".to_string())?;
    // PARSE_DAT(bar.dat) => 37
    evaluate(&mut runtime)?;

    // Nothing changed => 37
    evaluate(&mut runtime)?;

    runtime.set_input(FILE_CONTENTS, "main.lst", "foo.dat,baz.dat".to_string())?;
    runtime.set_input(FILE_CONTENTS, "bar.dat", "17".to_string())?;
    runtime.set_input(FILE_CONTENTS, "baz.dat", "0".to_string())?;
    // PARSE_LST(main.lst), PARSE_DAT(baz.dat), EVALUATE_LST(main.lst) => 13
    evaluate(&mut runtime)
}
