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

//! [`Ledger`] implementation for the raffle manager contract.
//!
//! Every write is dry-run with `eth_call` first so contract rejections come
//! back as typed [`Rejection`]s without spending gas. Confirmed writes are
//! decoded from the emitted events.

use abi::IRaffleManager::{self, IRaffleManagerErrors};
use alloy::{
    contract::{CallBuilder, CallDecoder, Error as ContractError},
    eips::BlockNumberOrTag,
    network::{Ethereum as AlloyEthereum, EthereumWallet, ReceiptResponse as _},
    primitives::{Address, B256, U256},
    providers::{
        Identity, Provider, ProviderBuilder, RootProvider,
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            SimpleNonceManager, WalletFiller,
        },
    },
    rpc::types::{Log, TransactionReceipt},
    signers::local::PrivateKeySigner,
    sol_types::{SolEvent, SolInterface},
    transports::{RpcError, TransportError},
};
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use keeper_common::{
    Ledger, LedgerError, LedgerResult, Raffle, RaffleId, RandomnessCommitment, Rejection,
    Secret, SelectionPath, Submitted, TxParams, WriteOutcome,
};
use std::time::Duration;

mod abi;

type AlloyRecommendedFillers = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<SimpleNonceManager>, ChainIdFiller>>,
>;
type KeeperFiller =
    JoinFill<JoinFill<Identity, AlloyRecommendedFillers>, WalletFiller<EthereumWallet>>;
type AlloyProvider = FillProvider<KeeperFiller, RootProvider, AlloyEthereum>;

type Instance = IRaffleManager::IRaffleManagerInstance<AlloyProvider>;

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct RaffleLedger {
    instance: Instance,
    signer: Address,
    confirmation_timeout: Duration,
}

impl RaffleLedger {
    /// Connects to `rpc_url` and checks that a contract is deployed at `contract`.
    pub async fn connect(
        rpc_url: &str,
        contract: Address,
        private_key: &str,
        confirmation_timeout: Duration,
    ) -> Result<Self> {
        ensure!(!contract.is_zero(), "raffle contract address is zero");

        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .context("invalid signing key")?;

        Self::connect_with(rpc_url, contract, signer, confirmation_timeout).await
    }

    /// Connects with a throwaway identity, for queries only.
    pub async fn read_only(rpc_url: &str, contract: Address) -> Result<Self> {
        ensure!(!contract.is_zero(), "raffle contract address is zero");

        Self::connect_with(
            rpc_url,
            contract,
            PrivateKeySigner::random(),
            DEFAULT_CONFIRMATION_TIMEOUT,
        )
        .await
    }

    async fn connect_with(
        rpc_url: &str,
        contract: Address,
        signer: PrivateKeySigner,
        confirmation_timeout: Duration,
    ) -> Result<Self> {
        let signer_address = signer.address();

        let provider = create_provider(rpc_url, signer)
            .await
            .with_context(|| format!("failed to connect to {rpc_url}"))?;

        let code = provider
            .get_code_at(contract)
            .await
            .context("failed to query contract code")?;
        ensure!(!code.is_empty(), "no contract deployed at {contract}");

        Ok(Self {
            instance: Instance::new(contract, provider),
            signer: signer_address,
            confirmation_timeout,
        })
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    fn provider(&self) -> &AlloyProvider {
        self.instance.provider()
    }

    async fn submit<D: CallDecoder>(
        &self,
        id: RaffleId,
        call: CallBuilder<&AlloyProvider, D>,
        params: &TxParams,
    ) -> LedgerResult<TransactionReceipt> {
        let call = call.from(self.signer);
        call.call().await.map_err(contract_error)?;

        let tip = self
            .provider()
            .get_max_priority_fee_per_gas()
            .await
            .map_err(transport_error)?
            .min(params.max_fee_per_gas);

        let pending = call
            .gas(params.gas_limit)
            .max_fee_per_gas(params.max_fee_per_gas)
            .max_priority_fee_per_gas(tip)
            .send()
            .await
            .map_err(send_error)?;

        let tx_hash = *pending.tx_hash();
        tracing::debug!(raffle = %id, tx = %tx_hash, "transaction sent");

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|err| {
                tracing::warn!(raffle = %id, tx = %tx_hash, error = %err, "no receipt");
                LedgerError::Timeout
            })?;

        if !receipt.status() {
            return Err(LedgerError::Reverted { tx_hash });
        }

        Ok(receipt)
    }

    fn find_event<E: SolEvent>(&self, receipt: &TransactionReceipt) -> Option<E> {
        receipt
            .inner
            .logs()
            .iter()
            .filter(|log| log.address() == self.address())
            .find_map(|log| decode_log::<E>(log).ok())
    }
}

async fn create_provider(rpc_url: &str, signer: PrivateKeySigner) -> Result<AlloyProvider> {
    Ok(ProviderBuilder::default()
        .filler(AlloyRecommendedFillers::default())
        .wallet(EthereumWallet::new(signer))
        .connect(rpc_url)
        .await?)
}

pub(crate) fn decode_log<E: SolEvent>(log: &Log) -> Result<E> {
    E::decode_raw_log(log.topics(), &log.data().data).map_err(Into::into)
}

fn submitted(receipt: &TransactionReceipt, outcome: WriteOutcome) -> Submitted {
    Submitted {
        tx_hash: receipt.transaction_hash,
        cost: receipt.gas_used as u128 * receipt.effective_gas_price,
        outcome,
    }
}

fn missing_event(name: &str, receipt: &TransactionReceipt) -> LedgerError {
    LedgerError::Decode(format!(
        "no {name} event in receipt of {}",
        receipt.transaction_hash
    ))
}

fn transport_error(err: TransportError) -> LedgerError {
    LedgerError::Transient(err.to_string())
}

fn contract_error(err: ContractError) -> LedgerError {
    if let Some(rejection) = err
        .as_revert_data()
        .and_then(|data| IRaffleManagerErrors::abi_decode(&data).ok())
    {
        return Rejection::from(rejection).into();
    }

    match err {
        ContractError::TransportError(RpcError::ErrorResp(payload)) => {
            Rejection::Other(payload.message.to_string()).into()
        }
        ContractError::TransportError(err) => transport_error(err),
        err => LedgerError::Decode(err.to_string()),
    }
}

/// Maps a failed `send` that follows a passing dry-run. Unless the node
/// returned a decodable contract error, the transaction may already be in
/// the pool and must not be resubmitted blindly.
fn send_error(err: ContractError) -> LedgerError {
    match contract_error(err) {
        LedgerError::Rejected(Rejection::Other(message)) => LedgerError::Unconfirmed(message),
        LedgerError::Rejected(rejection) => rejection.into(),
        err => LedgerError::Unconfirmed(err.to_string()),
    }
}

#[async_trait]
impl Ledger for RaffleLedger {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn active_raffles(&self) -> LedgerResult<Vec<RaffleId>> {
        let ids = self
            .instance
            .getActiveRaffles()
            .call()
            .await
            .map_err(contract_error)?;
        abi::utils::raffle_ids(ids)
    }

    async fn expired_raffles(&self) -> LedgerResult<Vec<RaffleId>> {
        let ids = self
            .instance
            .getExpiredRaffles()
            .call()
            .await
            .map_err(contract_error)?;
        abi::utils::raffle_ids(ids)
    }

    async fn sold_out_raffles(&self) -> LedgerResult<Vec<RaffleId>> {
        let ids = self
            .instance
            .getSoldOutRaffles()
            .call()
            .await
            .map_err(contract_error)?;
        abi::utils::raffle_ids(ids)
    }

    async fn raffle(&self, id: RaffleId) -> LedgerResult<Raffle> {
        self.instance
            .getRaffle(id.to_u256())
            .call()
            .await
            .map_err(contract_error)?
            .try_into()
    }

    async fn commitment(&self, id: RaffleId) -> LedgerResult<Option<RandomnessCommitment>> {
        let info = self
            .instance
            .getCommitment(id.to_u256())
            .call()
            .await
            .map_err(contract_error)?;
        abi::commitment(info)
    }

    async fn latest_timestamp(&self) -> LedgerResult<u64> {
        let block = self
            .provider()
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(transport_error)?
            .ok_or_else(|| LedgerError::Transient("latest block unavailable".into()))?;

        Ok(block.header.timestamp)
    }

    async fn gas_price(&self) -> LedgerResult<u128> {
        self.provider().get_gas_price().await.map_err(transport_error)
    }

    async fn signer_balance(&self) -> LedgerResult<U256> {
        self.provider()
            .get_balance(self.signer)
            .await
            .map_err(transport_error)
    }

    async fn commit_randomness(
        &self,
        id: RaffleId,
        commitment: B256,
        params: &TxParams,
    ) -> LedgerResult<Submitted> {
        let call = self.instance.commitRandomness(id.to_u256(), commitment);
        let receipt = self.submit(id, call, params).await?;

        let event = self
            .find_event::<IRaffleManager::RandomnessCommitted>(&receipt)
            .ok_or_else(|| missing_event("RandomnessCommitted", &receipt))?;

        let outcome = WriteOutcome::Committed {
            commit_time: abi::utils::uint256_to_u64(event.commitTime, "commitTime")?,
            reveal_deadline: abi::utils::uint256_to_u64(event.revealDeadline, "revealDeadline")?,
        };

        Ok(submitted(&receipt, outcome))
    }

    async fn reveal_randomness(
        &self,
        id: RaffleId,
        secret: &Secret,
        params: &TxParams,
    ) -> LedgerResult<Submitted> {
        let call = self.instance.revealRandomness(id.to_u256(), secret.expose());
        let receipt = self.submit(id, call, params).await?;

        let event = self
            .find_event::<IRaffleManager::WinnerSelected>(&receipt)
            .ok_or_else(|| missing_event("WinnerSelected", &receipt))?;

        let outcome = WriteOutcome::WinnerSelected {
            winner: event.winner,
            ticket_index: abi::utils::uint256_to_u64(event.ticketNumber, "ticketNumber")?,
            via: SelectionPath::Reveal,
        };

        Ok(submitted(&receipt, outcome))
    }

    async fn emergency_select(&self, id: RaffleId, params: &TxParams) -> LedgerResult<Submitted> {
        let call = self.instance.emergencySelectWinner(id.to_u256());
        let receipt = self.submit(id, call, params).await?;

        let (winner, ticket_number) = self
            .find_event::<IRaffleManager::EmergencyWinnerSelected>(&receipt)
            .map(|event| (event.winner, event.ticketNumber))
            .or_else(|| {
                self.find_event::<IRaffleManager::WinnerSelected>(&receipt)
                    .map(|event| (event.winner, event.ticketNumber))
            })
            .ok_or_else(|| missing_event("EmergencyWinnerSelected", &receipt))?;

        let outcome = WriteOutcome::WinnerSelected {
            winner,
            ticket_index: abi::utils::uint256_to_u64(ticket_number, "ticketNumber")?,
            via: SelectionPath::Emergency,
        };

        Ok(submitted(&receipt, outcome))
    }

    async fn cancel_raffle(&self, id: RaffleId, params: &TxParams) -> LedgerResult<Submitted> {
        let call = self.instance.cancelRaffle(id.to_u256());
        let receipt = self.submit(id, call, params).await?;

        self.find_event::<IRaffleManager::RaffleCancelled>(&receipt)
            .ok_or_else(|| missing_event("RaffleCancelled", &receipt))?;

        Ok(submitted(&receipt, WriteOutcome::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        primitives::LogData,
        rpc::json_rpc::ErrorPayload,
        transports::TransportErrorKind,
    };

    #[test]
    fn transport_failures_are_transient() {
        let err = contract_error(ContractError::TransportError(
            TransportErrorKind::backend_gone(),
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn error_responses_are_rejections() {
        let err = contract_error(ContractError::TransportError(RpcError::ErrorResp(
            ErrorPayload::internal_error(),
        )));
        assert!(matches!(err, LedgerError::Rejected(Rejection::Other(_))));
    }

    #[test]
    fn failed_send_is_unconfirmed() {
        let err = send_error(ContractError::TransportError(
            TransportErrorKind::backend_gone(),
        ));
        assert!(matches!(err, LedgerError::Unconfirmed(_)));
        assert!(err.is_ambiguous());

        let err = send_error(ContractError::TransportError(RpcError::ErrorResp(
            ErrorPayload::internal_error(),
        )));
        assert!(matches!(err, LedgerError::Unconfirmed(_)));
    }

    #[test]
    fn unknown_failures_are_decode_errors() {
        let err = contract_error(ContractError::UnknownFunction("finalize".into()));
        assert!(matches!(err, LedgerError::Decode(_)));
    }

    #[test]
    fn decodes_winner_event() {
        let event = IRaffleManager::WinnerSelected {
            raffleId: U256::from(3),
            winner: Address::repeat_byte(5),
            ticketNumber: U256::from(17),
        };
        let data: LogData = event.encode_log_data();
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(1),
                data,
            },
            ..Default::default()
        };

        let decoded = decode_log::<IRaffleManager::WinnerSelected>(&log).unwrap();
        assert_eq!(decoded.winner, Address::repeat_byte(5));
        assert_eq!(decoded.ticketNumber, U256::from(17));
        assert!(decode_log::<IRaffleManager::RaffleCancelled>(&log).is_err());
    }

    #[tokio::test]
    async fn zero_contract_address_is_refused() {
        let key = "0x0123456789012345678901234567890123456789012345678901234567890123";
        let err = RaffleLedger::connect("http://127.0.0.1:1", Address::ZERO, key, Duration::ZERO)
            .await
            .err()
            .unwrap();

        assert!(err.to_string().contains("zero"));
    }

    #[tokio::test]
    async fn malformed_key_is_refused() {
        let err = RaffleLedger::connect(
            "http://127.0.0.1:1",
            Address::repeat_byte(1),
            "not a key",
            Duration::ZERO,
        )
        .await
        .err()
        .unwrap();

        assert!(err.to_string().contains("signing key"));
    }
}
