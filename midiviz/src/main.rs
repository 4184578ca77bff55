use std::env;
use std::process;

use midiviz::config::Configuration;
use midiviz::config::settings::settings_path;
use midiviz::logging;

fn main() {
    logging::init_logger();

    let settings_path = settings_path();
    let config = Configuration::new(&settings_path, env::args_os())
        .unwrap_or_else(|err| {
            eprintln!("{}", err);
            process::exit(1);
        });

    if config.show_help {
        Configuration::print_help();
        return;
    }
    if config.show_version {
        Configuration::print_version();
        return;
    }

    process::exit(midiviz::run(config, settings_path));
}
