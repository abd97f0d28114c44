//! Consensus rounds against in-memory peers.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::BoxFuture;
use hyper::StatusCode;

use powledger::blockchain::hash_block;
use powledger::{
    is_valid, mine, valid_proof, Block, CancelFlag, Chain, ChainFetcher, ChainResponse,
    ConsensusResolver, FetchError, Ledger, Node, Timestamp, Transaction,
};

enum Reply {
    Chain(Duration, ChainResponse),
    Status(StatusCode),
    Hang,
}

#[derive(Default)]
struct FakePeers {
    replies: HashMap<String, Reply>,
}

impl FakePeers {
    fn with(mut self, peer: &str, reply: Reply) -> Self {
        self.replies.insert(peer.to_string(), reply);
        self
    }
}

impl ChainFetcher for FakePeers {
    fn fetch_chain<'a>(
        &'a self,
        peer: &'a str,
    ) -> BoxFuture<'a, Result<ChainResponse, FetchError>> {
        Box::pin(async move {
            match self.replies.get(peer) {
                Some(Reply::Chain(delay, response)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(response.clone())
                }
                Some(Reply::Status(status)) => Err(FetchError::Status(*status)),
                Some(Reply::Hang) => futures::future::pending().await,
                None => Err(FetchError::InvalidAddress(peer.to_string())),
            }
        })
    }
}

/// Genesis plus four mined blocks, built once for the whole file.
fn mined_blocks() -> &'static [Block] {
    static BLOCKS: OnceLock<Vec<Block>> = OnceLock::new();
    BLOCKS.get_or_init(|| {
        let mut ledger = Ledger::new();
        for i in 0..4 {
            let proof = mine(ledger.tip(), &CancelFlag::new()).unwrap();
            ledger.enqueue_transaction(Transaction::new("alice", "bob", i));
            ledger.seal_block(proof, None);
        }
        ledger.chain().blocks().to_vec()
    })
}

fn prefix(len: usize) -> Vec<Block> {
    mined_blocks()[..len].to_vec()
}

fn local(len: usize) -> Chain {
    Chain::try_from(prefix(len)).unwrap()
}

fn response(blocks: Vec<Block>) -> ChainResponse {
    ChainResponse {
        length: blocks.len() as u64,
        chain: blocks,
    }
}

fn ok(blocks: Vec<Block>) -> Reply {
    Reply::Chain(Duration::ZERO, response(blocks))
}

/// A six-block chain whose last proof does not satisfy the puzzle.
fn invalid_six() -> Vec<Block> {
    let mut ledger = Ledger::from_chain(local(5));
    let tip_hash = hash_block(ledger.tip());
    let tip_proof = ledger.tip().proof();
    let bad = (0..).find(|p| !valid_proof(tip_proof, *p, &tip_hash)).unwrap();
    ledger.seal_block(bad, None);
    let blocks = ledger.chain().blocks().to_vec();
    assert!(!is_valid(&blocks));
    blocks
}

/// Four blocks sharing the first three with `mined_blocks` but with a
/// different, still valid, fourth block.
fn alternative_four() -> Vec<Block> {
    let original = &mined_blocks()[3];
    let mut blocks = prefix(3);
    blocks.push(Block::new(
        4,
        Timestamp::from_micros(original.timestamp().as_micros() + 1),
        vec![Transaction::new("carol", "dave", 9)],
        original.proof(),
        original.previous_hash().to_string(),
    ));
    assert!(is_valid(&blocks));
    blocks
}

fn peers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn resolver(fake: FakePeers) -> ConsensusResolver {
    ConsensusResolver::new(Arc::new(fake), Duration::from_millis(200))
}

#[tokio::test]
async fn adopts_the_longest_valid_chain() {
    let fake = FakePeers::default()
        .with("a", ok(prefix(5)))
        .with("b", ok(prefix(4)));

    let resolution = resolver(fake).resolve(local(3), &peers(&["a", "b"])).await;
    assert!(resolution.adopted);
    assert_eq!(resolution.chain.blocks(), mined_blocks());
}

#[tokio::test]
async fn invalid_longer_chain_is_ignored() {
    let fake = FakePeers::default()
        .with("bad", ok(invalid_six()))
        .with("good", ok(prefix(4)));
    let r = resolver(fake);

    let resolution = r.resolve(local(3), &peers(&["bad", "good"])).await;
    assert!(resolution.adopted);
    assert_eq!(resolution.chain.len(), 4);

    let resolution = r.resolve(local(4), &peers(&["bad", "good"])).await;
    assert!(!resolution.adopted);
    assert_eq!(resolution.chain, local(4));
}

#[tokio::test]
async fn unreachable_peers_leave_chain_untouched() {
    let fake = FakePeers::default()
        .with("down", Reply::Status(StatusCode::SERVICE_UNAVAILABLE))
        .with("hung", Reply::Hang);

    let resolution = resolver(fake)
        .resolve(local(3), &peers(&["down", "hung", "unknown"]))
        .await;
    assert!(!resolution.adopted);
    assert_eq!(resolution.chain, local(3));
}

#[tokio::test]
async fn equal_length_tie_goes_to_first_listed_peer() {
    // The first peer answers last; order of `peers` still decides.
    let fake = FakePeers::default()
        .with("slow", Reply::Chain(Duration::from_millis(50), response(alternative_four())))
        .with("fast", ok(prefix(4)));

    let resolution = resolver(fake).resolve(local(3), &peers(&["slow", "fast"])).await;
    assert!(resolution.adopted);
    assert_eq!(resolution.chain.blocks(), alternative_four().as_slice());

    let fake = FakePeers::default()
        .with("slow", Reply::Chain(Duration::from_millis(50), response(alternative_four())))
        .with("fast", ok(prefix(4)));
    let resolution = resolver(fake).resolve(local(3), &peers(&["fast", "slow"])).await;
    assert_eq!(resolution.chain.blocks(), &mined_blocks()[..4]);
}

#[tokio::test]
async fn hung_peer_times_out_without_blocking_others() {
    let fake = FakePeers::default()
        .with("hung", Reply::Hang)
        .with("good", ok(prefix(5)));
    let r = resolver(fake);

    let results = r.fetch_all(&peers(&["hung", "good"])).await;
    assert!(matches!(results[0], Err(FetchError::Timeout(_))));
    assert!(results[1].is_ok());

    let resolution = r.resolve(local(1), &peers(&["hung", "good"])).await;
    assert!(resolution.adopted);
    assert_eq!(resolution.chain.len(), 5);
}

#[tokio::test]
async fn misreported_length_is_skipped() {
    let mut lying = response(prefix(4));
    lying.length = 10;
    let fake = FakePeers::default().with("liar", Reply::Chain(Duration::ZERO, lying));

    let resolution = resolver(fake).resolve(local(3), &peers(&["liar"])).await;
    assert!(!resolution.adopted);
}

#[tokio::test]
async fn node_adopts_peer_chain_and_keeps_mining_on_it() {
    let fake = FakePeers::default().with("a", ok(prefix(5)));
    let node = Node::new(Ledger::new(), resolver(fake), peers(&["a"]));

    assert_eq!(node.enqueue_transaction(Transaction::new("x", "y", 3)).await, 2);
    assert!(node.resolve_conflicts().await.unwrap());
    assert!(!node.resolve_conflicts().await.unwrap());

    let block = node.mine_block().await.unwrap();
    assert_eq!(block.index(), 6);
    assert_eq!(block.transactions(), &[Transaction::new("x", "y", 3)]);
    assert!(node.is_chain_valid().await);

    let ledger = node.ledger();
    let ledger = ledger.read().await;
    assert_eq!(&ledger.chain().blocks()[..5], mined_blocks());
}

#[tokio::test]
async fn node_without_peers_keeps_its_chain() {
    let node = Node::new(Ledger::new(), resolver(FakePeers::default()), Vec::new());
    let before = node.ledger().read().await.chain().clone();
    assert!(!node.resolve_conflicts().await.unwrap());
    assert_eq!(node.ledger().read().await.chain(), &before);
}

#[tokio::test]
async fn offset_index_chain_is_not_adopted() {
    let first = Block::new(10, Timestamp::from_micros(0), vec![], 100, "1".into());
    let proof = mine(&first, &CancelFlag::new()).unwrap();
    let second = Block::new(11, Timestamp::from_micros(1), vec![], proof, hash_block(&first));
    let fake = FakePeers::default().with("offset", ok(vec![first, second]));
    let node = Node::new(Ledger::new(), resolver(fake), peers(&["offset"]));

    assert!(!node.resolve_conflicts().await.unwrap());

    let block = node.mine_block().await.unwrap();
    assert_eq!(block.index(), 2);
    assert!(node.is_chain_valid().await);
}
