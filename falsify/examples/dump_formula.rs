use std::env;
use std::process::ExitCode;

use falsify::{parse_str, ExprBuilder};

fn main() -> ExitCode {
    env_logger::init();
    let src = env::args().nth(1).expect("Expected a formula");

    match parse_str(&src, &ExprBuilder::new()) {
        Ok(expr) => {
            println!("{}", expr);
            match expr.horizon() {
                Some(h) => println!("horizon: {} samples", h),
                None => println!("horizon: unbounded"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            err.eprint().unwrap();
            ExitCode::FAILURE
        }
    }
}
