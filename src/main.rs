use std::process;

fn main() {
    process::exit(test_expectations::cli::run());
}
