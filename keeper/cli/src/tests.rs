// This file is part of Gear.
//
// Copyright (C) 2025 Gear Technologies Inc.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0
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

use crate::{
    Cli,
    commands::Command,
    params::{MergeParams, Params},
};
use alloy_primitives::{Address, U256};
use clap::Parser;
use std::time::Duration;

const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

fn run_params(args: &[&str]) -> Params {
    let cli = Cli::try_parse_from(["raffle-keeper", "run"].iter().chain(args)).unwrap();
    match cli.command {
        Command::Run(run) => run.params,
        Command::Scan(_) => panic!("expected run command"),
    }
}

#[test]
fn defaults_apply() {
    let config = run_params(&["--contract", CONTRACT]).into_config().unwrap();

    assert_eq!(config.ethereum.rpc, "http://localhost:8545");
    assert_eq!(config.ethereum.contract, CONTRACT.parse::<Address>().unwrap());
    assert_eq!(config.ethereum.confirmation_timeout, Duration::from_secs(120));
    assert_eq!(config.keeper.poll_interval, Duration::from_secs(30));
    assert_eq!(config.keeper.policy.max_gas_price, 50_000_000_000);
    assert_eq!(config.keeper.policy.gas_limit, 500_000);
    assert_eq!(config.keeper.policy.max_attempts, 3);
    assert_eq!(config.keeper.summary_every, 10);
}

#[test]
fn command_line_values() {
    let config = run_params(&[
        "--contract",
        CONTRACT,
        "--rpc",
        "http://node:8545",
        "--poll-interval",
        "60",
        "--max-gas-price",
        "20",
        "--min-balance",
        "0.5",
        "--private-key",
        KEY,
    ])
    .into_config()
    .unwrap();

    assert_eq!(config.ethereum.rpc, "http://node:8545");
    assert_eq!(config.keeper.poll_interval, Duration::from_secs(60));
    assert_eq!(config.keeper.policy.max_gas_price, 20_000_000_000);
    assert_eq!(
        config.keeper.min_balance,
        U256::from(500_000_000_000_000_000u128)
    );
    assert_eq!(config.ethereum.private_key.unwrap().expose(), KEY);
}

#[test]
fn command_line_overrides_file() {
    let file = Params::from_toml(
        r#"
        [ethereum]
        rpc = "http://file:8545"
        contract = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        confirmation-timeout = 30

        [policy]
        poll-interval = 45
        max-attempts = 5
        "#,
    )
    .unwrap();

    let config = run_params(&["--poll-interval", "15"])
        .merge(file)
        .into_config()
        .unwrap();

    assert_eq!(config.ethereum.rpc, "http://file:8545");
    assert_eq!(config.ethereum.confirmation_timeout, Duration::from_secs(30));
    assert_eq!(config.keeper.poll_interval, Duration::from_secs(15));
    assert_eq!(config.keeper.policy.max_attempts, 5);
}

#[test]
fn unknown_file_keys_are_rejected() {
    assert!(Params::from_toml("[ethereum]\nrouter = \"0x00\"\n").is_err());
    assert!(Params::from_toml("[metrics]\nport = 9090\n").is_err());
}

#[test]
fn invalid_values_are_rejected() {
    assert!(run_params(&[]).into_config().is_err());
    assert!(run_params(&["--contract", "0x1234"]).into_config().is_err());
    assert!(
        run_params(&["--contract", CONTRACT, "--poll-interval", "0"])
            .into_config()
            .is_err()
    );
    assert!(
        run_params(&["--contract", CONTRACT, "--min-balance", "lots"])
            .into_config()
            .is_err()
    );
}

#[test]
fn signing_key_is_never_printed() {
    let params = run_params(&["--contract", CONTRACT, "--private-key", KEY]);
    assert!(!format!("{params:?}").contains(&KEY[2..]));

    let config = params.into_config().unwrap();
    assert!(!format!("{config:?}").contains(&KEY[2..]));
}

#[test]
fn scan_command_parses() {
    let cli = Cli::try_parse_from(["raffle-keeper", "scan", "--contract", CONTRACT, "-v"]).unwrap();
    let Command::Scan(scan) = cli.command else {
        panic!("expected scan command");
    };

    assert!(scan.verbose);
    assert_eq!(scan.params.ethereum.contract.as_deref(), Some(CONTRACT));
}
