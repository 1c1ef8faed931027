//! Store lookups shared by the pipelines and the relation sync

use cloudsync_core::{
    DataService, Page, ResourceFilter, ResourceKind, ResourceRecord, Result, SyncError, Vendor,
};
use std::collections::HashMap;

/// Read every page of a filtered list; a short page ends the loop
pub async fn list_all(
    db: &dyn DataService,
    kind: ResourceKind,
    filter: &ResourceFilter,
    page_limit: usize,
) -> Result<Vec<ResourceRecord>> {
    let limit = page_limit.max(1);
    let mut out = Vec::new();
    let mut start = 0;
    loop {
        let page = db
            .list_resources(kind, filter, Page::new(start, limit))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    kind = %kind,
                    account_id = ?filter.account_id,
                    start,
                    error = %e,
                    "list from db failed"
                );
            })?;
        let count = page.len();
        out.extend(page);
        if count < limit {
            break;
        }
        start += count;
    }
    Ok(out)
}

/// Stored rows for an explicit cloud id set, queried in chunks
pub async fn list_by_cloud_ids(
    db: &dyn DataService,
    kind: ResourceKind,
    filter: &ResourceFilter,
    cloud_ids: &[String],
    chunk: usize,
    page_limit: usize,
) -> Result<Vec<ResourceRecord>> {
    let mut out = Vec::new();
    for batch in cloud_ids.chunks(chunk.max(1)) {
        let filter = filter.clone().with_cloud_ids(batch.to_vec());
        out.extend(list_all(db, kind, &filter, page_limit).await?);
    }
    Ok(out)
}

/// Maps cloud ids to local ids for one vendor account
pub struct IdResolver<'a> {
    db: &'a dyn DataService,
    vendor: Vendor,
    account_id: &'a str,
    chunk: usize,
    page_limit: usize,
}

impl<'a> IdResolver<'a> {
    pub fn new(
        db: &'a dyn DataService,
        vendor: Vendor,
        account_id: &'a str,
        chunk: usize,
        page_limit: usize,
    ) -> Self {
        Self {
            db,
            vendor,
            account_id,
            chunk,
            page_limit,
        }
    }

    /// Local ids of the ids found; missing ids are simply absent
    pub async fn lookup(
        &self,
        kind: ResourceKind,
        cloud_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        if cloud_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let filter = ResourceFilter::new(self.vendor, self.account_id);
        let rows = list_by_cloud_ids(
            self.db,
            kind,
            &filter,
            cloud_ids,
            self.chunk,
            self.page_limit,
        )
        .await?;
        Ok(rows.into_iter().map(|r| (r.cloud_id, r.id)).collect())
    }

    /// Like `lookup`, but any miss is an `Unresolved` error
    pub async fn resolve(
        &self,
        kind: ResourceKind,
        cloud_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        let found = self.lookup(kind, cloud_ids).await?;
        if let Some(missing) = cloud_ids.iter().find(|id| !found.contains_key(*id)) {
            tracing::error!(
                vendor = %self.vendor,
                account_id = self.account_id,
                kind = %kind,
                cloud_id = %missing,
                "cloud id has no local row, was its resource synced?"
            );
            return Err(SyncError::Unresolved {
                kind,
                cloud_id: missing.clone(),
            });
        }
        Ok(found)
    }
}
