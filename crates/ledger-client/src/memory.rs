//! In-memory ledger, gas station and wallet for tests.
//!
//! The ledger enforces what a real one would: signatures, gas ownership,
//! controller authorization and optimistic version checks. Result shape and
//! confirmation behaviour are configurable.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use did_utils::{
    crypto::{sha256_hash::sha256_hash, Ed25519KeyPair, Generate},
    didcore::Document,
};
use serde_json::{json, Value};

use crate::{
    Address, Error, GasCoin, GasReservation, GasStation, Ledger, LedgerDid, Network, ObjectId, OnChainIdentity,
    SignedTransaction, TransactionDigest, TransactionKind, TransactionStatus, UserSignature, Wallet,
};

/// Flat fee charged per transaction.
pub const GAS_FEE: u64 = 1_000;

const IDENTITY_TYPE: &str = "0x2::identity::Identity";
const COIN_TYPE: &str = "0x2::coin::Coin<0x2::iota::IOTA>";

/// Shape of the results the node reports for direct transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    #[default]
    TypedOutput,
    ObjectChanges,
    /// Raw effects, as gas stations report them.
    Effects,
    /// A shape no client understands.
    Unrecognized,
}

/// When executed transactions become visible as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirmation {
    #[default]
    Immediate,
    /// Reported pending for the given number of status polls.
    AfterPolls(u32),
    Never,
}

struct Outcome {
    identity: ObjectId,
    created: bool,
    version: u64,
    gas_coin: ObjectId,
    gas_owner: Address,
}

struct Record {
    outcome: Result<Outcome, String>,
    polls: u32,
}

#[derive(Default)]
struct State {
    identities: HashMap<ObjectId, OnChainIdentity>,
    coins: HashMap<ObjectId, (Address, u64)>,
    transactions: HashMap<TransactionDigest, Record>,
    counter: u64,
}

pub struct MemoryLedger {
    network: Network,
    shape: ResultShape,
    confirmation: Confirmation,
    state: Mutex<State>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, Error> {
    mutex.lock().map_err(|_| Error::Rpc("state lock poisoned".to_string()))
}

impl MemoryLedger {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            shape: ResultShape::default(),
            confirmation: Confirmation::default(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_result_shape(mut self, shape: ResultShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Mints a coin for `owner`.
    pub fn fund(&self, owner: &Address, amount: u64) -> Result<ObjectId, Error> {
        let mut state = lock(&self.state)?;
        state.counter += 1;
        let coin = ObjectId::from_bytes(sha256_hash(format!("coin-{}", state.counter).as_bytes()));
        state.coins.insert(coin.clone(), (owner.clone(), amount));
        Ok(coin)
    }

    pub fn balance(&self, owner: &Address) -> Result<u64, Error> {
        let state = lock(&self.state)?;
        Ok(state
            .coins
            .values()
            .filter(|(coin_owner, _)| coin_owner == owner)
            .map(|(_, balance)| balance)
            .sum())
    }

    /// Number of identities ever created.
    pub fn identity_count(&self) -> Result<usize, Error> {
        Ok(lock(&self.state)?.identities.len())
    }

    /// Effects of an executed transaction, as a gas station reports them.
    pub fn effects(&self, digest: &TransactionDigest) -> Result<Value, Error> {
        let state = lock(&self.state)?;
        let record = state
            .transactions
            .get(digest)
            .ok_or_else(|| Error::NotFound(digest.to_string()))?;

        Ok(match &record.outcome {
            Err(reason) => json!({
                "transactionDigest": digest,
                "status": {"status": "failure", "error": reason},
            }),
            Ok(outcome) => Self::success_effects(digest, outcome),
        })
    }

    fn success_effects(digest: &TransactionDigest, outcome: &Outcome) -> Value {
        let identity = json!({
            "owner": {"Shared": {"initial_shared_version": 1}},
            "reference": {"objectId": outcome.identity, "version": outcome.version},
        });
        let coin = json!({
            "owner": {"AddressOwner": outcome.gas_owner},
            "reference": {"objectId": outcome.gas_coin},
        });
        let (created, mutated) = match outcome.created {
            true => (vec![identity], vec![coin]),
            false => (vec![], vec![identity, coin]),
        };
        json!({
            "transactionDigest": digest,
            "status": {"status": "success"},
            "created": created,
            "mutated": mutated,
        })
    }

    fn direct_result(&self, digest: &TransactionDigest, outcome: &Outcome) -> Value {
        let change = if outcome.created { "created" } else { "mutated" };
        match self.shape {
            ResultShape::TypedOutput => json!({
                "digest": digest,
                "output": {"identity": {"id": outcome.identity, "version": outcome.version}},
            }),
            ResultShape::ObjectChanges => json!({
                "digest": digest,
                "objectChanges": [
                    {
                        "type": change,
                        "objectId": outcome.identity,
                        "objectType": IDENTITY_TYPE,
                        "version": outcome.version,
                    },
                    {"type": "mutated", "objectId": outcome.gas_coin, "objectType": COIN_TYPE},
                ],
            }),
            ResultShape::Effects => json!({"effects": Self::success_effects(digest, outcome)}),
            ResultShape::Unrecognized => json!({"digest": digest, "status": "success"}),
        }
    }

    /// Replaces the placeholder DID a new document carries with its real DID.
    fn assign_did(&self, document: &Document, object_id: &ObjectId) -> Result<Document, Error> {
        let placeholder = LedgerDid::placeholder(self.network).to_string();
        let did = LedgerDid::new(self.network, object_id.clone()).to_string();
        let rewritten = serde_json::to_string(document)?.replace(&placeholder, &did);
        Ok(serde_json::from_str(&rewritten)?)
    }

    fn charge_gas(state: &mut State, transaction: &SignedTransaction) -> Result<ObjectId, Error> {
        let gas = &transaction.data.gas;
        if gas.budget < GAS_FEE {
            return Err(Error::Rejected(format!("gas budget {} below fee {GAS_FEE}", gas.budget)));
        }

        let mut total: u64 = 0;
        for coin in &gas.payment {
            match state.coins.get(coin) {
                Some((owner, balance)) if owner == &gas.owner => total += *balance,
                Some(_) => return Err(Error::Rejected(format!("gas coin {coin} not owned by {}", gas.owner))),
                None => return Err(Error::Rejected(format!("unknown gas coin {coin}"))),
            }
        }
        if total < GAS_FEE {
            return Err(Error::Rejected("insufficient gas".to_string()));
        }

        // Deduct from the first coins that can pay.
        let mut due = GAS_FEE;
        for coin in &gas.payment {
            if let Some((_, balance)) = state.coins.get_mut(coin) {
                let paid = due.min(*balance);
                *balance -= paid;
                due -= paid;
            }
        }

        gas.payment
            .first()
            .cloned()
            .ok_or_else(|| Error::Rejected("no gas payment".to_string()))
    }

    fn apply(
        &self,
        state: &mut State,
        digest: &TransactionDigest,
        transaction: &SignedTransaction,
        gas_coin: ObjectId,
    ) -> Result<Result<Outcome, String>, Error> {
        let sender = &transaction.data.sender;
        let gas_owner = transaction.data.gas.owner.clone();

        match &transaction.data.kind {
            TransactionKind::CreateIdentity { document } => {
                let id = ObjectId::from_bytes(sha256_hash(digest.0.as_bytes()));
                let document = self.assign_did(document, &id)?;
                state.identities.insert(
                    id.clone(),
                    OnChainIdentity {
                        id: id.clone(),
                        document,
                        version: 1,
                        controller: sender.clone(),
                    },
                );
                Ok(Ok(Outcome {
                    identity: id,
                    created: true,
                    version: 1,
                    gas_coin,
                    gas_owner,
                }))
            }
            TransactionKind::UpdateDocument {
                identity,
                document,
                expected_version,
            } => {
                let Some(current) = state.identities.get_mut(identity) else {
                    return Ok(Err(format!("identity {identity} does not exist")));
                };
                if &current.controller != sender {
                    return Ok(Err(format!("{sender} does not control {identity}")));
                }
                if current.version != *expected_version {
                    return Ok(Err(format!(
                        "version mismatch on {identity}: expected {expected_version}, found {}",
                        current.version
                    )));
                }

                current.document = document.clone();
                current.version += 1;
                Ok(Ok(Outcome {
                    identity: identity.clone(),
                    created: false,
                    version: current.version,
                    gas_coin,
                    gas_owner,
                }))
            }
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn network(&self) -> Network {
        self.network
    }

    async fn get_identity(&self, id: &ObjectId) -> Result<Option<OnChainIdentity>, Error> {
        Ok(lock(&self.state)?.identities.get(id).cloned())
    }

    async fn gas_coins(&self, owner: &Address) -> Result<Vec<GasCoin>, Error> {
        let state = lock(&self.state)?;
        let mut coins: Vec<GasCoin> = state
            .coins
            .iter()
            .filter(|(_, (coin_owner, balance))| coin_owner == owner && *balance > 0)
            .map(|(object_id, (_, balance))| GasCoin {
                object_id: object_id.clone(),
                balance: *balance,
            })
            .collect();
        coins.sort_by(|a, b| b.balance.cmp(&a.balance));
        Ok(coins)
    }

    async fn execute_transaction(&self, transaction: &SignedTransaction) -> Result<TransactionDigest, Error> {
        transaction.verify()?;
        let digest = transaction.data.digest()?;

        let mut state = lock(&self.state)?;
        if state.transactions.contains_key(&digest) {
            return Err(Error::Rejected(format!("transaction {digest} already executed")));
        }

        let gas_coin = Self::charge_gas(&mut state, transaction)?;
        let outcome = self.apply(&mut state, &digest, transaction, gas_coin)?;
        state.transactions.insert(digest.clone(), Record { outcome, polls: 0 });

        Ok(digest)
    }

    async fn transaction_status(&self, digest: &TransactionDigest) -> Result<TransactionStatus, Error> {
        let mut state = lock(&self.state)?;
        let record = state
            .transactions
            .get_mut(digest)
            .ok_or_else(|| Error::NotFound(digest.to_string()))?;
        record.polls += 1;

        let confirmed = match self.confirmation {
            Confirmation::Immediate => true,
            Confirmation::AfterPolls(pending) => record.polls > pending,
            Confirmation::Never => false,
        };
        if !confirmed {
            return Ok(TransactionStatus::Pending);
        }

        Ok(match &record.outcome {
            Ok(outcome) => TransactionStatus::Executed(self.direct_result(digest, outcome)),
            Err(reason) => TransactionStatus::Failed(reason.clone()),
        })
    }
}

/// Gas station sponsoring transactions on a [`MemoryLedger`].
pub struct MemoryGasStation {
    ledger: Arc<MemoryLedger>,
    sponsor: Ed25519KeyPair,
    reservations: Mutex<HashMap<u64, Vec<ObjectId>>>,
    next_reservation: AtomicU64,
    executions: AtomicUsize,
}

impl MemoryGasStation {
    pub fn new(ledger: Arc<MemoryLedger>) -> Result<Self, Error> {
        Ok(Self {
            ledger,
            sponsor: Ed25519KeyPair::new()?,
            reservations: Mutex::new(HashMap::new()),
            next_reservation: AtomicU64::new(1),
            executions: AtomicUsize::new(0),
        })
    }

    pub fn sponsor_address(&self) -> Result<Address, Error> {
        Address::from_keypair(&self.sponsor)
    }

    /// Number of transactions executed through the station.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GasStation for MemoryGasStation {
    async fn reserve_gas(&self, budget: u64, _duration: Duration) -> Result<GasReservation, Error> {
        let sponsor_address = self.sponsor_address()?;
        let coin = self.ledger.fund(&sponsor_address, budget)?;

        let reservation_id = self.next_reservation.fetch_add(1, Ordering::SeqCst);
        lock(&self.reservations)?.insert(reservation_id, vec![coin.clone()]);

        Ok(GasReservation {
            sponsor_address,
            reservation_id,
            gas_coins: vec![coin],
        })
    }

    async fn execute(&self, reservation_id: u64, transaction: &SignedTransaction) -> Result<Value, Error> {
        let reserved = lock(&self.reservations)?
            .remove(&reservation_id)
            .ok_or_else(|| Error::GasStation(format!("unknown reservation {reservation_id}")))?;

        if transaction.data.gas.owner != self.sponsor_address()? || transaction.data.gas.payment != reserved {
            return Err(Error::GasStation("transaction does not use the reserved gas".to_string()));
        }

        let mut sponsored = transaction.clone();
        sponsored.sponsor_signature = Some(UserSignature::sign(&transaction.data, &self.sponsor)?);

        let digest = self.ledger.execute_transaction(&sponsored).await?;
        self.executions.fetch_add(1, Ordering::SeqCst);

        Ok(json!({ "effects": self.ledger.effects(&digest)? }))
    }
}

/// Wallet funding addresses straight from the ledger's mint.
pub struct MemoryWallet {
    ledger: Arc<MemoryLedger>,
    transfers: Mutex<Vec<(Address, u64)>>,
}

impl MemoryWallet {
    pub fn new(ledger: Arc<MemoryLedger>) -> Self {
        Self {
            ledger,
            transfers: Mutex::new(vec![]),
        }
    }

    /// Recipients and amounts of past transfers.
    pub fn transfers(&self) -> Vec<(Address, u64)> {
        lock(&self.transfers).map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Wallet for MemoryWallet {
    async fn get_addresses(
        &self,
        identity: &str,
        account_index: u32,
        address_index: u32,
        count: u32,
    ) -> Result<Vec<Address>, Error> {
        Ok((address_index..address_index + count)
            .map(|index| Address::from_public_key(&sha256_hash(format!("{identity}/{account_index}/{index}").as_bytes())))
            .collect())
    }

    async fn transfer(&self, _identity: &str, _from: &Address, to: &Address, amount: u64) -> Result<TransactionDigest, Error> {
        let coin = self.ledger.fund(to, amount)?;
        lock(&self.transfers)?.push((to.clone(), amount));
        Ok(TransactionDigest(format!("transfer-{coin}")))
    }
}
