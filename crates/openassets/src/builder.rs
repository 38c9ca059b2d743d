//! The transaction builder: a coin-selection and output-layout planner that
//! emits unsigned Bitcoin transactions performing Open Assets operations.
//!
//! Every operation satisfies both Open Assets quantity conservation
//! (per-asset inputs cover outputs) and Bitcoin value conservation (input
//! satoshis equal output satoshis plus fees), while keeping every
//! non-OP_RETURN output at or above a dust floor. Coin selection is greedy
//! in the iteration order of the supplied unspent lists; callers curate
//! input order. The builder is purely computational: it never fetches,
//! never suspends, and never mutates the spendable outputs it is given.

use openassets_core::ser::ByteFormat;
use thiserror::Error;

use crate::{
    hashes::AssetId,
    marker::{MarkerError, MarkerPayload},
    types::{
        colored::SpendableOutput,
        script::{ScriptPubkey, ScriptSig},
        tx::Tx,
        txin::TxIn,
        txout::TxOut,
    },
};

/// The default minimum satoshi value for a non-OP_RETURN output.
pub const DEFAULT_DUST_AMOUNT: u64 = 600;

/// Parameters for a bitcoin or asset transfer.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TransferParameters {
    /// The outputs available for selection, in selection order.
    pub unspent_outputs: Vec<SpendableOutput>,
    /// The script receiving the transferred amount.
    pub to_script: ScriptPubkey,
    /// The script receiving any change.
    pub change_script: ScriptPubkey,
    /// The number of units (satoshis or asset units) to transfer.
    pub amount: u64,
}

impl TransferParameters {
    /// Instantiate new TransferParameters.
    pub fn new(
        unspent_outputs: Vec<SpendableOutput>,
        to_script: ScriptPubkey,
        change_script: ScriptPubkey,
        amount: u64,
    ) -> Self {
        TransferParameters {
            unspent_outputs,
            to_script,
            change_script,
            amount,
        }
    }
}

/// Parameters for an asset issuance.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct IssuanceParameters {
    /// The outputs available for selection, in selection order.
    pub unspent_outputs: Vec<SpendableOutput>,
    /// The script the issued asset id is bound to. Coins are drawn only
    /// from unspent outputs paying this script.
    pub issue_script: ScriptPubkey,
    /// The script receiving the issued units.
    pub to_script: ScriptPubkey,
    /// The script receiving the bitcoin change.
    pub change_script: ScriptPubkey,
    /// The number of units to issue.
    pub amount: u64,
}

/// Errors surfaced by the transaction builder.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The unspent outputs do not hold enough units of the required asset.
    #[error("insufficient units of asset {asset_id}: required {required}, available {available}")]
    InsufficientAssets {
        /// The asset that ran short.
        asset_id: AssetId,
        /// The number of units required.
        required: u64,
        /// The number of units available.
        available: u64,
    },

    /// The unspent outputs do not hold enough satoshis.
    #[error("insufficient funds: required {required} satoshis, available {available}")]
    InsufficientFunds {
        /// The number of satoshis required.
        required: u64,
        /// The number of satoshis available.
        available: u64,
    },

    /// A payment output would fall below the dust floor.
    #[error("output value {value} is below the dust amount {dust_amount}")]
    DustOutput {
        /// The requested output value.
        value: u64,
        /// The configured dust floor.
        dust_amount: u64,
    },

    /// The marker payload could not be serialized (an asset quantity is out
    /// of range).
    #[error(transparent)]
    Marker(#[from] MarkerError),
}

/// Plans unsigned Open Assets transactions over caller-supplied spendable
/// outputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TransactionBuilder {
    dust_amount: u64,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_DUST_AMOUNT)
    }
}

impl TransactionBuilder {
    /// Instantiate a builder with the given dust floor.
    pub fn new(dust_amount: u64) -> Self {
        TransactionBuilder { dust_amount }
    }

    /// The configured dust floor.
    pub fn dust_amount(&self) -> u64 {
        self.dust_amount
    }

    /// Create an asset issuance transaction.
    ///
    /// The transaction issues `params.amount` units of the asset bound to
    /// `params.issue_script` to `params.to_script`, followed by the marker
    /// output carrying `[amount]` and `metadata`, followed by a bitcoin
    /// change output. Selection prefers leaving enough for a change output;
    /// when the issuer's coins cover the dust floor and fees but not a
    /// change output, the sub-dust residue folds into fees instead.
    pub fn issue(
        &self,
        params: &IssuanceParameters,
        metadata: &[u8],
        fees: u64,
    ) -> Result<Tx, BuildError> {
        let eligible: Vec<SpendableOutput> = params
            .unspent_outputs
            .iter()
            .filter(|o| o.output.script_pubkey == params.issue_script)
            .cloned()
            .collect();

        let with_change = (2u64.saturating_mul(self.dust_amount)).saturating_add(fees);
        let without_change = self.dust_amount.saturating_add(fees);
        let (inputs, total) = match Self::collect_uncolored_outputs(&eligible, with_change) {
            Ok(found) => found,
            Err(BuildError::InsufficientFunds { .. }) => {
                Self::collect_uncolored_outputs(&eligible, without_change)?
            }
            Err(e) => return Err(e),
        };

        let mut vout = vec![
            TxOut::new(self.dust_amount, params.to_script.clone()),
            Self::marker_output(vec![params.amount], metadata)?,
        ];
        let change = total.saturating_sub(self.dust_amount).saturating_sub(fees);
        if change >= self.dust_amount {
            vout.push(TxOut::new(change, params.change_script.clone()));
        }

        Ok(Tx::new(1u32, Self::unsigned_inputs(&inputs), vout, 0))
    }

    /// Create a transaction moving any number of assets plus bitcoin.
    ///
    /// This is the planner underneath every non-issuance operation. For
    /// each `(asset_id, spec)` pair it selects colored outputs covering
    /// `spec.amount`, emits a dust-valued transfer output to
    /// `spec.to_script`, and an asset change output to `spec.change_script`
    /// when more units were collected than sent. Bitcoin needed for the
    /// payment, the dust floors, and fees beyond what the selected colored
    /// outputs carry is drawn from `btc_transfer.unspent_outputs`
    /// (uncolored outputs only). The marker output is inserted at index 0,
    /// so every asset output sits in the transfer region.
    pub fn transfer(
        &self,
        asset_transfers: &[(AssetId, TransferParameters)],
        btc_transfer: &TransferParameters,
        fees: u64,
    ) -> Result<Tx, BuildError> {
        let mut inputs: Vec<SpendableOutput> = vec![];
        let mut outputs: Vec<TxOut> = vec![];
        let mut asset_quantities: Vec<u64> = vec![];

        for (asset_id, spec) in asset_transfers.iter() {
            let (colored, collected) =
                Self::collect_colored_outputs(&spec.unspent_outputs, asset_id, spec.amount)?;
            inputs.extend(colored);
            outputs.push(TxOut::new(self.dust_amount, spec.to_script.clone()));
            asset_quantities.push(spec.amount);
            if collected > spec.amount {
                outputs.push(TxOut::new(self.dust_amount, spec.change_script.clone()));
                asset_quantities.push(collected - spec.amount);
            }
        }

        let input_value: i128 = inputs.iter().map(|i| i.output.value as i128).sum();
        let output_value: i128 = outputs.iter().map(|o| o.value as i128).sum();
        let mut btc_excess = input_value - output_value;

        let needed = btc_transfer.amount as i128 + fees as i128;
        if btc_excess < needed {
            // not enough bitcoin among the colored inputs
            let shortfall = u64::try_from(needed - btc_excess).unwrap_or(u64::MAX);
            let (uncolored, collected) =
                Self::collect_uncolored_outputs(&btc_transfer.unspent_outputs, shortfall)?;
            inputs.extend(uncolored);
            btc_excess += collected as i128;
        }

        if btc_transfer.amount > 0 {
            outputs.push(self.uncolored_output(&btc_transfer.to_script, btc_transfer.amount)?);
        }
        // sub-dust change folds into fees instead of becoming an output
        let change = btc_excess - needed;
        if change >= self.dust_amount as i128 {
            outputs.push(TxOut::new(change as u64, btc_transfer.change_script.clone()));
        }

        if !asset_quantities.is_empty() {
            outputs.insert(0, Self::marker_output(asset_quantities, b"")?);
        }

        Ok(Tx::new(1u32, Self::unsigned_inputs(&inputs), outputs, 0))
    }

    /// Transfer `params.amount` units of `asset_id`, drawing bitcoin for
    /// fees and dust floors from `btc_transfer.unspent_outputs`.
    pub fn transfer_assets(
        &self,
        asset_id: AssetId,
        params: TransferParameters,
        btc_transfer: TransferParameters,
        fees: u64,
    ) -> Result<Tx, BuildError> {
        self.transfer(&[(asset_id, params)], &btc_transfer, fees)
    }

    /// Transfer bitcoin only. Colored outputs in the unspent list are never
    /// selected, so no marker is needed and no asset value can be
    /// destroyed.
    pub fn transfer_bitcoin(
        &self,
        params: TransferParameters,
        fees: u64,
    ) -> Result<Tx, BuildError> {
        self.transfer(&[], &params, fees)
    }

    /// Create a single transaction in which one party pays
    /// `btc_transfer.amount` satoshis and the counterparty pays
    /// `asset_transfer.amount` units of `asset_id`. The bitcoin side funds
    /// the fees.
    pub fn btc_asset_swap(
        &self,
        btc_transfer: TransferParameters,
        asset_id: AssetId,
        asset_transfer: TransferParameters,
        fees: u64,
    ) -> Result<Tx, BuildError> {
        self.transfer(&[(asset_id, asset_transfer)], &btc_transfer, fees)
    }

    /// Create a single transaction swapping two assets. The first party's
    /// uncolored coins fund the fees and dust floors.
    pub fn asset_asset_swap(
        &self,
        asset1_id: AssetId,
        asset1_transfer: TransferParameters,
        asset2_id: AssetId,
        asset2_transfer: TransferParameters,
        fees: u64,
    ) -> Result<Tx, BuildError> {
        let btc_transfer = TransferParameters::new(
            asset1_transfer.unspent_outputs.clone(),
            ScriptPubkey::null(),
            asset1_transfer.change_script.clone(),
            0,
        );
        self.transfer(
            &[(asset1_id, asset1_transfer), (asset2_id, asset2_transfer)],
            &btc_transfer,
            fees,
        )
    }

    /// Greedily select uncolored outputs until `amount` satoshis are
    /// covered.
    fn collect_uncolored_outputs(
        unspent_outputs: &[SpendableOutput],
        amount: u64,
    ) -> Result<(Vec<SpendableOutput>, u64), BuildError> {
        let mut total: u64 = 0;
        let mut result = vec![];
        for output in unspent_outputs.iter().filter(|o| !o.output.is_colored()) {
            result.push(output.clone());
            total = total.saturating_add(output.output.value);
            if total >= amount {
                return Ok((result, total));
            }
        }
        Err(BuildError::InsufficientFunds {
            required: amount,
            available: total,
        })
    }

    /// Greedily select outputs colored with `asset_id` until `amount` units
    /// are covered.
    fn collect_colored_outputs(
        unspent_outputs: &[SpendableOutput],
        asset_id: &AssetId,
        amount: u64,
    ) -> Result<(Vec<SpendableOutput>, u64), BuildError> {
        let mut total: u64 = 0;
        let mut result = vec![];
        for output in unspent_outputs
            .iter()
            .filter(|o| o.output.asset_id.as_ref() == Some(asset_id))
        {
            result.push(output.clone());
            total = total.saturating_add(output.output.asset_quantity);
            if total >= amount {
                return Ok((result, total));
            }
        }
        Err(BuildError::InsufficientAssets {
            asset_id: *asset_id,
            required: amount,
            available: total,
        })
    }

    /// An uncolored payment output. The primary payment may never be below
    /// the dust floor.
    fn uncolored_output(&self, script: &ScriptPubkey, value: u64) -> Result<TxOut, BuildError> {
        if value < self.dust_amount {
            return Err(BuildError::DustOutput {
                value,
                dust_amount: self.dust_amount,
            });
        }
        Ok(TxOut::new(value, script.clone()))
    }

    /// The zero-value marker output for a quantity list and metadata.
    fn marker_output(asset_quantities: Vec<u64>, metadata: &[u8]) -> Result<TxOut, BuildError> {
        let payload = MarkerPayload::new(asset_quantities, metadata.to_vec());
        let mut bytes = vec![];
        payload.write_to(&mut bytes)?;
        Ok(TxOut::op_return(&bytes))
    }

    /// Unsigned inputs spending the selected outputs, in selection order.
    fn unsigned_inputs(selected: &[SpendableOutput]) -> Vec<TxIn> {
        selected
            .iter()
            .map(|o| TxIn::new(o.outpoint, ScriptSig::null(), 0xffff_ffff))
            .collect()
    }
}
