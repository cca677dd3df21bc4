use std::path::Path;

use moat_blocking::BlockingController;
use moat_blocklist::ListRefresher;
use tempfile::TempDir;

use super::*;
use crate::{
    chain,
    testing::{Calls, StaticResolver, request, request_from},
};

struct Setup {
    head: Box<dyn Resolver>,
    control: Arc<BlockingController>,
    next_calls: Calls,
    _dir: TempDir,
}

fn write_list(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

async fn setup(block_type: BlockType, client_groups: &[(&str, &[&str])]) -> Setup {
    let dir = TempDir::new().unwrap();
    let ads = write_list(dir.path(), "ads.txt", "ads.example.com\n");
    let kids = write_list(dir.path(), "kids.txt", "0.0.0.0 games.net\n");

    let config = BlockingConfig {
        block_type,
        block_ttl_secs: 3600,
        denylists: HashMap::from([("ads".to_string(), vec![ads]), ("kids".to_string(), vec![kids])]),
        client_groups: client_groups
            .iter()
            .map(|(client, groups)| (client.to_string(), groups.iter().map(|g| g.to_string()).collect()))
            .collect(),
        ..Default::default()
    };

    let lists = Arc::new(BlocklistService::new(&config.denylists).unwrap());
    lists.refresh_lists().await.unwrap();

    let control = Arc::new(BlockingController::new(lists.group_names()));
    let node = BlockingResolver::new(&config, control.clone(), lists);

    let next = StaticResolver::answering("default");
    let next_calls = next.calls();

    Setup {
        head: chain(vec![Box::new(node)], Box::new(next)),
        control,
        next_calls,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_blocks_with_zero_ip() {
    let setup = setup(BlockType::ZeroIp, &[]).await;

    let response = setup.head.resolve(&request("tracker.ads.example.com", RecordType::A)).await.unwrap();
    assert_eq!(response.reason, "BLOCKED (ads)");
    assert_eq!(response.resolver_type, ResolverType::Blocked);
    assert_eq!(response.message.response_code().unwrap(), DnsResponseCode::NoError);
    assert_eq!(response.message.answers()[0].data, DnsRecordData::Ipv4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(response.message.answers()[0].ttl, 3600);

    let response = setup.head.resolve(&request("ads.example.com", RecordType::AAAA)).await.unwrap();
    assert_eq!(response.message.answers()[0].data, DnsRecordData::Ipv6(Ipv6Addr::UNSPECIFIED));

    let response = setup.head.resolve(&request("games.net", RecordType::MX)).await.unwrap();
    assert_eq!(response.reason, "BLOCKED (kids)");
    assert_eq!(response.message.response_code().unwrap(), DnsResponseCode::NxDomain);
    assert!(response.message.answers().is_empty());

    assert_eq!(setup.next_calls.get(), 0);
}

#[tokio::test]
async fn test_blocks_with_nx_domain() {
    let setup = setup(BlockType::NxDomain, &[]).await;

    let response = setup.head.resolve(&request("ads.example.com", RecordType::A)).await.unwrap();
    assert_eq!(response.message.response_code().unwrap(), DnsResponseCode::NxDomain);
    assert!(response.message.answers().is_empty());
}

#[tokio::test]
async fn test_unlisted_domain_is_delegated() {
    let setup = setup(BlockType::ZeroIp, &[]).await;

    let response = setup.head.resolve(&request("example.com", RecordType::A)).await.unwrap();
    assert_eq!(response.reason, "RESOLVED (default)");
    assert_eq!(setup.next_calls.get(), 1);
}

#[tokio::test]
async fn test_client_groups() {
    let setup = setup(BlockType::ZeroIp, &[("10.0.0.5", &["kids"]), ("default", &["ads"])]).await;

    let kid = "10.0.0.5:5353".parse().unwrap();
    let other = "10.0.0.6:5353".parse().unwrap();

    let response = setup.head.resolve(&request_from("games.net", RecordType::A, kid)).await.unwrap();
    assert_eq!(response.reason, "BLOCKED (kids)");

    let response = setup.head.resolve(&request_from("ads.example.com", RecordType::A, kid)).await.unwrap();
    assert_eq!(response.reason, "RESOLVED (default)");

    let response = setup.head.resolve(&request_from("games.net", RecordType::A, other)).await.unwrap();
    assert_eq!(response.reason, "RESOLVED (default)");

    let response = setup.head.resolve(&request_from("ads.example.com", RecordType::A, other)).await.unwrap();
    assert_eq!(response.reason, "BLOCKED (ads)");
}

#[tokio::test]
async fn test_disabled_groups_are_exempt() {
    let setup = setup(BlockType::ZeroIp, &[]).await;

    setup.control.disable_blocking(None, vec!["ads".into()]).unwrap();

    let response = setup.head.resolve(&request("ads.example.com", RecordType::A)).await.unwrap();
    assert_eq!(response.reason, "RESOLVED (default)");

    let response = setup.head.resolve(&request("games.net", RecordType::A)).await.unwrap();
    assert_eq!(response.reason, "BLOCKED (kids)");

    setup.control.disable_blocking(None, vec![]).unwrap();
    let response = setup.head.resolve(&request("games.net", RecordType::A)).await.unwrap();
    assert_eq!(response.reason, "RESOLVED (default)");

    setup.control.enable_blocking();
    let response = setup.head.resolve(&request("ads.example.com", RecordType::A)).await.unwrap();
    assert_eq!(response.reason, "BLOCKED (ads)");
}

#[tokio::test]
async fn test_without_lists_is_deactivated() {
    let lists = Arc::new(BlocklistService::new(&HashMap::new()).unwrap());
    let control = Arc::new(BlockingController::new(Vec::<String>::new()));
    let node = BlockingResolver::new(&BlockingConfig::default(), control, lists);

    assert_eq!(node.configuration(), vec![DEACTIVATED.to_string()]);

    let head = chain(vec![Box::new(node)], Box::new(StaticResolver::answering("default")));
    let response = head.resolve(&request("ads.example.com", RecordType::A)).await.unwrap();
    assert_eq!(response.reason, "RESOLVED (default)");
}

#[test]
fn test_config_defaults() {
    let config = BlockingConfig::default();
    assert_eq!(config.block_type, BlockType::ZeroIp);
    assert_eq!(config.block_ttl_secs, 21600);
    assert!(config.denylists.is_empty());
}
