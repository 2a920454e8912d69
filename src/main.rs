use apitest::{core, signals, status::ExitStatus};

fn main() -> ExitStatus {
    // Without a handler Ctrl+C still ends the process, just without a summary
    let _ = signals::install_handler();

    let status = core::run(std::env::args().collect());
    if signals::was_interrupted() {
        ExitStatus::Interrupted
    } else {
        status
    }
}
