//! The colored output value object: a Bitcoin output augmented with the
//! Open Assets attributes computed by the coloring engine.

use crate::{
    hashes::AssetId,
    types::script::ScriptPubkey,
    types::txin::Outpoint,
};

/// The position of an output relative to the marker output of its
/// transaction.
#[derive(serde::Serialize, serde::Deserialize, Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OutputCategory {
    /// The output carries no asset. Outputs of unmarked transactions, the
    /// marker output itself, and transfer-region outputs with no assigned
    /// quantity are all uncolored.
    Uncolored,
    /// The output sits before the marker output.
    Issuance,
    /// The output sits after the marker output and carries a transferred
    /// asset.
    Transfer,
}

/// A Bitcoin output augmented with optional asset id, asset quantity, and
/// output category.
///
/// Invariants maintained by the coloring engine:
/// - `Uncolored` implies no asset id and a quantity of 0.
/// - A quantity greater than 0 implies an asset id is present.
///
/// `metadata` is the marker payload metadata of the containing transaction,
/// propagated to every output; it is empty for unmarked transactions.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct ColoredOutput {
    /// The value of the output in satoshis.
    pub value: u64,
    /// The `ScriptPubkey` which locks the UTXO.
    pub script_pubkey: ScriptPubkey,
    /// The asset carried by the output, if any.
    pub asset_id: Option<AssetId>,
    /// The number of asset units carried by the output. 0 iff the output is
    /// uncolored or an unissued issuance slot.
    pub asset_quantity: u64,
    /// The position of the output relative to the marker.
    pub output_category: OutputCategory,
    /// The marker metadata of the containing transaction.
    pub metadata: Vec<u8>,
}

impl ColoredOutput {
    /// Instantiate an output from all of its attributes.
    pub fn new(
        value: u64,
        script_pubkey: ScriptPubkey,
        asset_id: Option<AssetId>,
        asset_quantity: u64,
        output_category: OutputCategory,
        metadata: Vec<u8>,
    ) -> Self {
        ColoredOutput {
            value,
            script_pubkey,
            asset_id,
            asset_quantity,
            output_category,
            metadata,
        }
    }

    /// Instantiate an uncolored output.
    pub fn uncolored(value: u64, script_pubkey: ScriptPubkey) -> Self {
        ColoredOutput {
            value,
            script_pubkey,
            asset_id: None,
            asset_quantity: 0,
            output_category: OutputCategory::Uncolored,
            metadata: vec![],
        }
    }

    /// True if the output carries an asset.
    pub fn is_colored(&self) -> bool {
        self.asset_id.is_some()
    }
}

/// A colored output paired with the outpoint that identifies it. This is
/// the builder's input currency: callers own these, and the builder never
/// mutates them.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct SpendableOutput {
    /// The outpoint identifying the output.
    pub outpoint: Outpoint,
    /// The colored output itself.
    pub output: ColoredOutput,
}

impl SpendableOutput {
    /// Instantiate a new SpendableOutput.
    pub fn new(outpoint: Outpoint, output: ColoredOutput) -> Self {
        SpendableOutput { outpoint, output }
    }
}
