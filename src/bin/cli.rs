// acsm-downloader - ACSM fulfillment front end
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use acsm_downloader::cli::{parse_args, usage, Invocation};
use acsm_downloader::download::{process, Outcome};
use acsm_downloader::engine::{DrmEngine, EngineBridge};
use acsm_downloader::file::FileLocator;
use acsm_downloader::{logging, Config, DownloaderError};

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let invocation = match parse_args(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(err) => {
            println!("{}", usage());
            return err.exit_code();
        }
    };

    match invocation {
        Invocation::Help => {
            println!("{}", usage());
            0
        }
        Invocation::Version { engine, verbosity } => {
            logging::init(verbosity);
            match EngineBridge::new(engine, verbosity).version() {
                Ok(version) => {
                    println!("Current libgourou version : {}", version);
                    0
                }
                Err(err) => {
                    println!("{}", err);
                    err.exit_code()
                }
            }
        }
        Invocation::Run(config) => {
            logging::init(config.verbosity);
            download(&config)
        }
    }
}

fn download(config: &Config) -> i32 {
    let engine = EngineBridge::new(config.engine.clone(), config.verbosity);
    let locator = FileLocator::from_env(&engine.default_adept_dir());

    match process(&engine, &locator, config) {
        Ok(Outcome::KeyExported(path)) => {
            println!("Private license key exported to {}", path.display());
            0
        }
        Ok(Outcome::Downloaded {
            path, loan_token, ..
        }) => {
            println!("Created {}", path.display());
            if let Some(loan_token) = loan_token {
                println!("Loan token serialized into {}", loan_token.display());
            }
            0
        }
        // Each missing file was already reported by the locator
        Err(err @ DownloaderError::MissingCredentials(_)) => err.exit_code(),
        Err(err) => {
            println!("{}", err);
            err.exit_code()
        }
    }
}
