use futures::future::join_all;
use log::{info, warn};
use reqwest::{Client, Method};

use std::time::Duration;

use crate::blockchain::transaction::TransactionRequest;

/// HTTP client for notifying peers
///
/// Every call is best effort: failures are logged and never returned.
#[derive(Debug, Clone)]
pub struct PeerClient {
    client: Client,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(PeerClient { client })
    }

    /// Replicates an accepted transaction to every peer
    pub async fn broadcast_transaction(&self, peers: &[String], request: &TransactionRequest) {
        join_all(
            peers
                .iter()
                .map(|peer| self.send(Method::PUT, peer, Some(request))),
        )
        .await;
    }

    /// Tells every peer to drop its pending transactions after a block was committed
    pub async fn broadcast_clear(&self, peers: &[String]) {
        join_all(peers.iter().map(|peer| self.send(Method::DELETE, peer, None))).await;
    }

    async fn send(&self, method: Method, peer: &str, body: Option<&TransactionRequest>) {
        let endpoint = transactions_endpoint(peer);
        let mut request = self.client.request(method.clone(), &endpoint);
        if let Some(body) = body {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) => info!("{} {} -> {}", method, endpoint, response.status()),
            Err(err) => warn!("{} {} failed: {}", method, endpoint, err),
        }
    }
}

fn transactions_endpoint(peer: &str) -> String {
    format!("http://{}/transactions", peer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transactions_endpoint() {
        assert_eq!(transactions_endpoint("10.0.0.2:5001"), "http://10.0.0.2:5001/transactions");
    }

    #[tokio::test]
    async fn test_unreachable_peers_are_swallowed() {
        let client = PeerClient::new(Duration::from_millis(200)).unwrap();
        // Port 9 on loopback has nothing listening
        let peers = vec!["127.0.0.1:9".to_string()];

        client.broadcast_clear(&peers).await;
        client.broadcast_transaction(&peers, &TransactionRequest::default()).await;
    }

    #[tokio::test]
    async fn test_no_peers_is_noop() {
        let client = PeerClient::new(Duration::from_millis(200)).unwrap();
        client.broadcast_clear(&[]).await;
    }
}
