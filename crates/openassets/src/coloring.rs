//! The coloring engine: a recursive transaction interpreter that computes
//! the asset id and asset quantity attached to every output of a
//! transaction.
//!
//! Coloring an output requires coloring its transaction, which requires the
//! colored previous outputs of every input, fetched through a
//! [`TransactionProvider`]. The recursion is driven as an iterative
//! depth-first traversal with an explicit worklist, so arbitrarily deep
//! UTXO chains cannot overflow the call stack. A per-call memo table plus
//! the injected [`OutputCache`] bound the work to at most one coloring per
//! outpoint per cache lifetime.
//!
//! Structural problems with a transaction's marker never fail a call: per
//! protocol, a transaction whose marker does not balance is simply treated
//! as unmarked and all of its outputs are uncolored. Those downgrades are
//! reported on the `tracing` channel for diagnostics.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::{
    cache::OutputCache,
    hashes::{AssetId, TXID},
    marker::{MarkerError, MarkerPayload},
    types::{
        colored::{ColoredOutput, OutputCategory},
        tx::Tx,
        txin::Outpoint,
    },
};

/// The transaction-fetch callback. Implementations deliver parsed
/// transactions from wherever they keep them (a node, an index, a map of
/// fixtures); `Ok(None)` means the transaction is unknown.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// An error type
    type Error: std::error::Error + Send + 'static;

    /// Fetch a transaction. If the tx is not known, the result will be
    /// `Ok(None)`.
    async fn get_tx(&self, txid: TXID) -> Result<Option<Tx>, Self::Error>;
}

/// Errors surfaced by the coloring engine.
#[derive(Debug, Error)]
pub enum ColoringError<E>
where
    E: std::error::Error + 'static,
{
    /// The provider had no transaction for a txid the ancestry needs.
    #[error("transaction not found: {}", .0.to_be_hex())]
    TransactionNotFound(TXID),

    /// An input references an output index its previous transaction does
    /// not have.
    #[error("output {index} does not exist in transaction {}", .txid.to_be_hex())]
    InvalidOutputIndex {
        /// The transaction missing the output.
        txid: TXID,
        /// The referenced output index.
        index: u32,
    },

    /// An error bubbled up from the transaction provider.
    #[error(transparent)]
    Provider(E),
}

/// The coloring engine. Purely functional given its provider and cache:
/// for a fixed ancestor set, coloring the same outpoint always yields the
/// same result.
#[derive(Debug)]
pub struct ColoringEngine<P, C> {
    provider: P,
    cache: C,
}

impl<P, C> ColoringEngine<P, C>
where
    P: TransactionProvider,
    C: OutputCache,
{
    /// Instantiate an engine over a provider and a cache.
    pub fn new(provider: P, cache: C) -> Self {
        ColoringEngine { provider, cache }
    }

    /// Resolve the colored attributes of a single output.
    pub async fn get_output(
        &self,
        txid: TXID,
        index: u32,
    ) -> Result<ColoredOutput, ColoringError<P::Error>> {
        let outpoint = Outpoint::new(txid, index);
        if let Some(hit) = self.cache.get(&outpoint).await {
            return Ok(hit);
        }

        let mut memo = HashMap::new();
        let mut txs = HashMap::new();
        self.color_ancestry(txid, &mut memo, &mut txs).await?;

        let outputs = match memo.remove(&txid) {
            Some(outputs) => outputs,
            None => return Err(ColoringError::TransactionNotFound(txid)),
        };
        outputs
            .into_iter()
            .nth(index as usize)
            .ok_or(ColoringError::InvalidOutputIndex { txid, index })
    }

    /// Resolve the colored attributes of every output of a transaction the
    /// caller already holds. Ancestors are still fetched through the
    /// provider as needed.
    pub async fn color_transaction(
        &self,
        tx: &Tx,
    ) -> Result<Vec<ColoredOutput>, ColoringError<P::Error>> {
        let txid = tx.txid();
        let mut memo = HashMap::new();
        let mut txs = HashMap::new();
        txs.insert(txid, tx.clone());
        self.color_ancestry(txid, &mut memo, &mut txs).await?;
        memo.remove(&txid)
            .ok_or(ColoringError::TransactionNotFound(txid))
    }

    /// Color `root` and every ancestor its marker requires, depth-first
    /// with an explicit worklist. On return, `memo` holds the colored
    /// outputs of `root` and of every ancestor visited along the way.
    async fn color_ancestry(
        &self,
        root: TXID,
        memo: &mut HashMap<TXID, Vec<ColoredOutput>>,
        txs: &mut HashMap<TXID, Tx>,
    ) -> Result<(), ColoringError<P::Error>> {
        let mut stack = vec![root];

        while let Some(txid) = stack.last().copied() {
            if memo.contains_key(&txid) {
                stack.pop();
                continue;
            }

            if !txs.contains_key(&txid) {
                let fetched = self
                    .provider
                    .get_tx(txid)
                    .await
                    .map_err(ColoringError::Provider)?
                    .ok_or(ColoringError::TransactionNotFound(txid))?;
                txs.insert(txid, fetched);
            }
            let tx = &txs[&txid];

            // Coinbase transactions are never colored.
            let marker = if tx.is_coinbase() {
                None
            } else {
                Self::find_marker(tx, txid)
            };

            let colored = match marker {
                None => Self::uncolored_outputs(tx),
                Some((marker_index, payload)) => {
                    // Resolve the colored previous output of every input,
                    // queueing any ancestor not yet colored.
                    let mut inputs = Vec::with_capacity(tx.vin.len());
                    let mut missing = vec![];
                    for txin in tx.vin.iter() {
                        let prevout = txin.outpoint;
                        if let Some(ancestor) = memo.get(&prevout.txid) {
                            match ancestor.get(prevout.idx as usize) {
                                Some(output) => inputs.push(output.clone()),
                                None => {
                                    return Err(ColoringError::InvalidOutputIndex {
                                        txid: prevout.txid,
                                        index: prevout.idx,
                                    })
                                }
                            }
                        } else if let Some(hit) = self.cache.get(&prevout).await {
                            inputs.push(hit);
                        } else {
                            missing.push(prevout.txid);
                        }
                    }
                    if !missing.is_empty() {
                        // revisit this transaction once its ancestors are
                        // colored
                        stack.extend(missing);
                        continue;
                    }

                    match Self::compute_colored_outputs(tx, marker_index, &payload, &inputs) {
                        Some(colored) => colored,
                        None => {
                            tracing::debug!(
                                txid = %txid.to_be_hex(),
                                "marker quantities do not balance; treating transaction as unmarked"
                            );
                            Self::uncolored_outputs(tx)
                        }
                    }
                }
            };

            for (i, output) in colored.iter().enumerate() {
                self.cache
                    .put(Outpoint::new(txid, i as u32), output.clone())
                    .await;
            }
            memo.insert(txid, colored);
            stack.pop();
        }
        Ok(())
    }

    /// Locate the marker output: the first output whose OP_RETURN push
    /// parses as a version-1 payload. Magic-bearing payloads that fail
    /// structurally are reported diagnostically and skipped.
    fn find_marker(tx: &Tx, txid: TXID) -> Option<(usize, MarkerPayload)> {
        for (i, output) in tx.vout.iter().enumerate() {
            match MarkerPayload::parse_script(&output.script_pubkey) {
                Ok(Some(payload)) => return Some((i, payload)),
                // not an OP_RETURN push, or ordinary OP_RETURN data
                Ok(None) | Err(MarkerError::BadMagic) => {}
                Err(error) => {
                    tracing::debug!(
                        txid = %txid.to_be_hex(),
                        vout = i,
                        %error,
                        "skipping structurally invalid marker candidate"
                    );
                }
            }
        }
        None
    }

    fn uncolored_outputs(tx: &Tx) -> Vec<ColoredOutput> {
        tx.vout
            .iter()
            .map(|o| ColoredOutput::uncolored(o.value, o.script_pubkey.clone()))
            .collect()
    }

    /// Apply the coloring rules to a marked transaction. `None` means the
    /// marker does not balance (quantity list too long, no inputs, a
    /// transfer output spanning two assets, or demand exceeding supply) and
    /// the transaction must be treated as unmarked.
    fn compute_colored_outputs(
        tx: &Tx,
        marker_index: usize,
        payload: &MarkerPayload,
        inputs: &[ColoredOutput],
    ) -> Option<Vec<ColoredOutput>> {
        let quantities = &payload.asset_quantities;
        if quantities.len() > tx.vout.len().saturating_sub(1) {
            return None;
        }
        if inputs.is_empty() {
            return None;
        }

        let metadata = &payload.metadata;
        let mut result = Vec::with_capacity(tx.vout.len());

        // Issuance outputs all take the asset id bound to the script of the
        // first input's previous output.
        let issuance_asset_id = AssetId::new(&inputs[0].script_pubkey);
        for (i, output) in tx.vout.iter().enumerate().take(marker_index) {
            let quantity = quantities.get(i).copied().unwrap_or(0);
            let asset_id = if quantity > 0 {
                Some(issuance_asset_id)
            } else {
                None
            };
            result.push(ColoredOutput::new(
                output.value,
                output.script_pubkey.clone(),
                asset_id,
                quantity,
                OutputCategory::Issuance,
                metadata.clone(),
            ));
        }

        // The marker itself carries no asset.
        let marker_output = &tx.vout[marker_index];
        result.push(ColoredOutput::new(
            marker_output.value,
            marker_output.script_pubkey.clone(),
            None,
            0,
            OutputCategory::Uncolored,
            metadata.clone(),
        ));

        // Transfer outputs consume the concatenated colored input units in
        // order. Each non-zero output must consume a contiguous run of
        // identical-asset units.
        let mut units = inputs.iter().filter_map(|input| match input.asset_id {
            Some(id) if input.asset_quantity > 0 => Some((id, input.asset_quantity)),
            _ => None,
        });
        let mut current: Option<(AssetId, u64)> = None;
        for (i, output) in tx.vout.iter().enumerate().skip(marker_index + 1) {
            let quantity = quantities.get(i - 1).copied().unwrap_or(0);
            let mut output_units_left = quantity;
            let mut asset_id: Option<AssetId> = None;
            while output_units_left > 0 {
                if current.map_or(true, |(_, left)| left == 0) {
                    current = Some(units.next()?);
                }
                if let Some((id, left)) = current.as_mut() {
                    let progress = (*left).min(output_units_left);
                    output_units_left -= progress;
                    *left -= progress;
                    match asset_id {
                        None => asset_id = Some(*id),
                        Some(existing) if existing == *id => {}
                        // a single output may not span two assets
                        Some(_) => return None,
                    }
                }
            }
            if quantity > 0 {
                result.push(ColoredOutput::new(
                    output.value,
                    output.script_pubkey.clone(),
                    asset_id,
                    quantity,
                    OutputCategory::Transfer,
                    metadata.clone(),
                ));
            } else {
                result.push(ColoredOutput::new(
                    output.value,
                    output.script_pubkey.clone(),
                    None,
                    0,
                    OutputCategory::Uncolored,
                    metadata.clone(),
                ));
            }
        }

        Some(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cache::{MemoryCache, NoCache},
        types::script::{ScriptPubkey, ScriptSig},
        types::txout::TxOut,
    };
    use std::convert::Infallible;
    use std::sync::Mutex;

    /// A provider over a fixed map of transactions, counting fetches.
    #[derive(Default)]
    struct MapProvider {
        txs: HashMap<TXID, Tx>,
        fetches: Mutex<usize>,
    }

    impl MapProvider {
        fn new(txs: Vec<Tx>) -> Self {
            MapProvider {
                txs: txs.into_iter().map(|tx| (tx.txid(), tx)).collect(),
                fetches: Mutex::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl TransactionProvider for MapProvider {
        type Error = Infallible;

        async fn get_tx(&self, txid: TXID) -> Result<Option<Tx>, Self::Error> {
            *self.fetches.lock().unwrap() += 1;
            Ok(self.txs.get(&txid).cloned())
        }
    }

    fn p2pkh(seed: u8) -> ScriptPubkey {
        let mut v = vec![0x76, 0xa9, 0x14];
        v.extend_from_slice(&[seed; 20]);
        v.extend_from_slice(&[0x88, 0xac]);
        ScriptPubkey::new(v)
    }

    fn spend(tx: &Tx, idx: u32) -> crate::types::txin::TxIn {
        crate::types::txin::TxIn::new(
            Outpoint::new(tx.txid(), idx),
            ScriptSig::null(),
            0xffff_ffff,
        )
    }

    /// An unmarked transaction paying `script` once per value.
    fn base_tx(script: &ScriptPubkey, values: &[u64]) -> Tx {
        Tx::new(
            1u32,
            vec![crate::types::txin::TxIn::new(
                Outpoint::null(),
                ScriptSig::null(),
                0,
            )],
            values
                .iter()
                .map(|v| TxOut::new(*v, script.clone()))
                .collect::<Vec<_>>(),
            0,
        )
    }

    #[tokio::test]
    async fn it_leaves_unmarked_transactions_uncolored() {
        let tx = Tx::new(
            1u32,
            vec![crate::types::txin::TxIn::new(
                Outpoint::new(TXID::from([9u8; 32]), 0),
                ScriptSig::null(),
                0,
            )],
            vec![
                TxOut::op_return(b"hello"),
                TxOut::new(600u64, p2pkh(1)),
            ],
            0,
        );
        let engine = ColoringEngine::new(MapProvider::default(), NoCache);
        let colored = engine.color_transaction(&tx).await.unwrap();
        assert_eq!(colored.len(), 2);
        for output in colored.iter() {
            assert_eq!(output.output_category, OutputCategory::Uncolored);
            assert_eq!(output.asset_id, None);
            assert_eq!(output.asset_quantity, 0);
        }
        // no marker, so nothing was fetched
        assert_eq!(engine.provider.fetch_count(), 0);
    }

    #[tokio::test]
    async fn it_colors_a_simple_issuance() {
        let issue_script = p2pkh(1);
        let funding = base_tx(&issue_script, &[20_000]);

        let issuing = Tx::new(
            1u32,
            vec![spend(&funding, 0)],
            vec![
                TxOut::new(600u64, issue_script.clone()),
                MarkerPayload::new(vec![1500], vec![]).output(),
                TxOut::new(9_400u64, issue_script.clone()),
            ],
            0,
        );

        let engine = ColoringEngine::new(MapProvider::new(vec![funding]), NoCache);
        let colored = engine.color_transaction(&issuing).await.unwrap();

        assert_eq!(colored[0].asset_id, Some(AssetId::new(&issue_script)));
        assert_eq!(colored[0].asset_quantity, 1500);
        assert_eq!(colored[0].output_category, OutputCategory::Issuance);

        // the marker carries no asset
        assert_eq!(colored[1].asset_id, None);
        assert_eq!(colored[1].output_category, OutputCategory::Uncolored);

        // transfer region beyond the quantity list
        assert_eq!(colored[2].asset_id, None);
        assert_eq!(colored[2].asset_quantity, 0);
        assert_eq!(colored[2].output_category, OutputCategory::Uncolored);
    }

    /// Issue `quantities` of the asset bound to `script` in one
    /// transaction, one issuance output per quantity.
    fn issuance_chain(script: &ScriptPubkey, quantities: &[u64]) -> (Tx, Tx) {
        let funding = base_tx(script, &[50_000]);
        let mut vout: Vec<TxOut> = quantities
            .iter()
            .map(|_| TxOut::new(600u64, script.clone()))
            .collect();
        vout.push(MarkerPayload::new(quantities.to_vec(), vec![]).output());
        let issuing = Tx::new(1u32, vec![spend(&funding, 0)], vout, 0);
        (funding, issuing)
    }

    #[tokio::test]
    async fn it_conserves_units_across_a_transfer() {
        let issue_script = p2pkh(1);
        let (funding, issuing) = issuance_chain(&issue_script, &[1000, 500]);
        let asset = AssetId::new(&issue_script);

        let transfer = Tx::new(
            1u32,
            vec![spend(&issuing, 0), spend(&issuing, 1)],
            vec![
                MarkerPayload::new(vec![700, 800], vec![]).output(),
                TxOut::new(600u64, p2pkh(2)),
                TxOut::new(600u64, p2pkh(3)),
            ],
            0,
        );

        let engine = ColoringEngine::new(MapProvider::new(vec![funding, issuing]), NoCache);
        let colored = engine.color_transaction(&transfer).await.unwrap();

        assert_eq!(colored[0].output_category, OutputCategory::Uncolored);
        assert_eq!(colored[1].asset_id, Some(asset));
        assert_eq!(colored[1].asset_quantity, 700);
        assert_eq!(colored[1].output_category, OutputCategory::Transfer);
        assert_eq!(colored[2].asset_id, Some(asset));
        assert_eq!(colored[2].asset_quantity, 800);
        assert_eq!(colored[2].output_category, OutputCategory::Transfer);
    }

    #[tokio::test]
    async fn it_downgrades_transfers_spanning_two_assets() {
        let script_a = p2pkh(1);
        let script_b = p2pkh(2);
        let (funding_a, issuing_a) = issuance_chain(&script_a, &[100]);
        let (funding_b, issuing_b) = issuance_chain(&script_b, &[100]);

        let transfer = Tx::new(
            1u32,
            vec![spend(&issuing_a, 0), spend(&issuing_b, 0)],
            vec![
                MarkerPayload::new(vec![150], vec![]).output(),
                TxOut::new(600u64, p2pkh(3)),
            ],
            0,
        );

        let engine = ColoringEngine::new(
            MapProvider::new(vec![funding_a, issuing_a, funding_b, issuing_b]),
            NoCache,
        );
        let colored = engine.color_transaction(&transfer).await.unwrap();
        for output in colored.iter() {
            assert_eq!(output.output_category, OutputCategory::Uncolored);
            assert_eq!(output.asset_quantity, 0);
        }
    }

    #[tokio::test]
    async fn it_downgrades_when_demand_exceeds_supply() {
        let issue_script = p2pkh(1);
        let (funding, issuing) = issuance_chain(&issue_script, &[100]);

        let transfer = Tx::new(
            1u32,
            vec![spend(&issuing, 0)],
            vec![
                MarkerPayload::new(vec![101], vec![]).output(),
                TxOut::new(600u64, p2pkh(2)),
            ],
            0,
        );

        let engine = ColoringEngine::new(MapProvider::new(vec![funding, issuing]), NoCache);
        let colored = engine.color_transaction(&transfer).await.unwrap();
        for output in colored.iter() {
            assert_eq!(output.output_category, OutputCategory::Uncolored);
        }
    }

    #[tokio::test]
    async fn it_skips_zero_quantity_slots_when_assigning_assets() {
        // mirrors the worked example from the protocol specification: six
        // inputs across three assets, marker at index 2
        let script_a = p2pkh(1);
        let script_b = p2pkh(2);
        let (funding_a, issuing_a) = issuance_chain(&script_a, &[3, 2, 5, 3]);
        let (funding_b, issuing_b) = issuance_chain(&script_b, &[9]);
        let uncolored_funding = base_tx(&p2pkh(4), &[10_000]);

        let asset_a = AssetId::new(&script_a);
        let asset_b = AssetId::new(&script_b);
        let issue_script = p2pkh(5);
        let issued = AssetId::new(&p2pkh(1)); // first input's prevout script

        let tx = Tx::new(
            1u32,
            vec![
                spend(&issuing_a, 0),
                spend(&issuing_a, 1),
                spend(&uncolored_funding, 0),
                spend(&issuing_a, 2),
                spend(&issuing_a, 3),
                spend(&issuing_b, 0),
            ],
            vec![
                TxOut::new(600u64, issue_script.clone()),
                TxOut::new(600u64, issue_script.clone()),
                MarkerPayload::new(vec![0, 10, 6, 0, 7, 3], vec![]).output(),
                TxOut::new(600u64, p2pkh(6)),
                TxOut::new(600u64, p2pkh(6)),
                TxOut::new(600u64, p2pkh(6)),
                TxOut::new(600u64, p2pkh(6)),
            ],
            0,
        );

        let engine = ColoringEngine::new(
            MapProvider::new(vec![
                funding_a,
                issuing_a,
                funding_b,
                issuing_b,
                uncolored_funding,
            ]),
            NoCache,
        );
        let colored = engine.color_transaction(&tx).await.unwrap();

        // issuance region: quantity 0 keeps the category but no asset
        assert_eq!(colored[0].asset_id, None);
        assert_eq!(colored[0].asset_quantity, 0);
        assert_eq!(colored[0].output_category, OutputCategory::Issuance);
        assert_eq!(colored[1].asset_id, Some(issued));
        assert_eq!(colored[1].asset_quantity, 10);

        // marker
        assert_eq!(colored[2].output_category, OutputCategory::Uncolored);

        // transfer region: 6 of A, a skipped slot, 7 of A, 3 of B
        assert_eq!(colored[3].asset_id, Some(asset_a));
        assert_eq!(colored[3].asset_quantity, 6);
        assert_eq!(colored[4].asset_id, None);
        assert_eq!(colored[4].output_category, OutputCategory::Uncolored);
        assert_eq!(colored[5].asset_id, Some(asset_a));
        assert_eq!(colored[5].asset_quantity, 7);
        assert_eq!(colored[6].asset_id, Some(asset_b));
        assert_eq!(colored[6].asset_quantity, 3);
    }

    #[tokio::test]
    async fn it_memoizes_through_the_cache() {
        let issue_script = p2pkh(1);
        let (funding, issuing) = issuance_chain(&issue_script, &[1000]);
        let issuing_txid = issuing.txid();

        let engine = ColoringEngine::new(MapProvider::new(vec![funding, issuing]), MemoryCache::new());
        let first = engine.get_output(issuing_txid, 0).await.unwrap();
        let fetches = engine.provider.fetch_count();
        assert!(fetches > 0);

        // the second resolution is served entirely from the cache
        let second = engine.get_output(issuing_txid, 0).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.provider.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn it_propagates_missing_transactions() {
        let engine = ColoringEngine::new(MapProvider::default(), NoCache);
        let missing = TXID::from([7u8; 32]);
        match engine.get_output(missing, 0).await {
            Err(ColoringError::TransactionNotFound(txid)) => assert_eq!(txid, missing),
            other => panic!("expected TransactionNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_propagates_marker_metadata_to_every_output() {
        let issue_script = p2pkh(1);
        let funding = base_tx(&issue_script, &[20_000]);
        let metadata = b"u=https://cpr.sm/5YgSU1Pg-q".to_vec();

        let issuing = Tx::new(
            1u32,
            vec![spend(&funding, 0)],
            vec![
                TxOut::new(600u64, issue_script.clone()),
                MarkerPayload::new(vec![1500], metadata.clone()).output(),
            ],
            0,
        );

        let engine = ColoringEngine::new(MapProvider::new(vec![funding]), NoCache);
        let colored = engine.color_transaction(&issuing).await.unwrap();
        for output in colored.iter() {
            assert_eq!(output.metadata, metadata);
        }
    }

    #[tokio::test]
    async fn it_ignores_markers_longer_than_the_output_list() {
        let issue_script = p2pkh(1);
        let funding = base_tx(&issue_script, &[20_000]);

        // two quantities, but only one non-marker output
        let issuing = Tx::new(
            1u32,
            vec![spend(&funding, 0)],
            vec![
                TxOut::new(600u64, issue_script.clone()),
                MarkerPayload::new(vec![10, 20], vec![]).output(),
            ],
            0,
        );

        let engine = ColoringEngine::new(MapProvider::new(vec![funding]), NoCache);
        let colored = engine.color_transaction(&issuing).await.unwrap();
        for output in colored.iter() {
            assert_eq!(output.output_category, OutputCategory::Uncolored);
        }
    }
}
