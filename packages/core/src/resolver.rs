//! Scanned-code resolution.
//!
//! Capture stations send opaque codes from badges and tool tags. The
//! resolver turns them into workers, items and edge nodes.

use async_trait::async_trait;

use crate::error::{CustodyError, CustodyResult, Missing};
use crate::model::{CustodialItem, EdgeNode, Worker};
use crate::repository::{items, people, ToolroomRepository};

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Active worker for a badge code.
    async fn resolve_worker(&self, code: &str) -> CustodyResult<Worker>;

    /// Active asset for a tag code, otherwise a kit.
    async fn resolve_item(&self, code: &str) -> CustodyResult<CustodialItem>;

    /// Best effort: unknown nodes and lookup failures both yield `None`.
    async fn resolve_origin_node(&self, node_id: &str) -> Option<EdgeNode>;
}

#[async_trait]
impl IdentityResolver for ToolroomRepository {
    async fn resolve_worker(&self, code: &str) -> CustodyResult<Worker> {
        let mut conn = self.pool().acquire().await?;
        people::find_active_worker_by_code(&mut conn, code)
            .await?
            .ok_or_else(|| CustodyError::NotFound(Missing::Worker(code.to_string())))
    }

    async fn resolve_item(&self, code: &str) -> CustodyResult<CustodialItem> {
        let mut conn = self.pool().acquire().await?;
        if let Some(asset) = items::find_active_asset_by_code(&mut conn, code).await? {
            return Ok(CustodialItem::Asset(asset));
        }
        items::find_kit_by_code(&mut conn, code)
            .await?
            .map(CustodialItem::Kit)
            .ok_or_else(|| CustodyError::NotFound(Missing::Item(code.to_string())))
    }

    async fn resolve_origin_node(&self, node_id: &str) -> Option<EdgeNode> {
        let mut conn = match self.pool().acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!("Edge node lookup for '{}' skipped: {}", node_id, err);
                return None;
            }
        };
        match people::find_edge_node(&mut conn, node_id).await {
            Ok(node) => node,
            Err(err) => {
                tracing::warn!("Edge node lookup for '{}' failed: {}", node_id, err);
                None
            }
        }
    }
}
