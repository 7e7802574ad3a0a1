//! Scatter-gather engine.
//!
//! A listing runs in two fan-outs over the same map snapshot: a count per
//! shard, then a fetch of up to `offset + limit` locally sorted rows per
//! shard. Partials are concatenated in shard-key order, re-sorted with the
//! global comparator, and sliced to the requested window.
//!
//! Every shard task binds its own [`ShardContext`] before resolving its
//! pool. The first failing shard aborts the remaining tasks and fails the
//! listing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info};

use waypoint_core::config::QueryConfig;
use waypoint_core::{Page, PageRequest, Plan, PlanComparator, PlanSummary, ShardKey, validate};
use waypoint_shard::{ShardCatalog, ShardContext, ShardMap};
use waypoint_state::{ShardStats, ShardStore, StateResult};

use crate::error::{QueryError, QueryResult};

pub struct ScatterGather {
    catalog: Arc<ShardCatalog>,
    shard_timeout: Duration,
    max_page_size: usize,
}

impl ScatterGather {
    pub fn new(catalog: Arc<ShardCatalog>, config: &QueryConfig) -> Self {
        Self {
            catalog,
            shard_timeout: config.shard_timeout(),
            max_page_size: config.max_page_size,
        }
    }

    pub fn catalog(&self) -> &Arc<ShardCatalog> {
        &self.catalog
    }

    /// One page of all plans in global order.
    pub async fn list_plans(&self, request: &PageRequest) -> QueryResult<Page<PlanSummary>> {
        self.list_plans_on(&self.catalog.snapshot(), request).await
    }

    /// [`Self::list_plans`] against a snapshot the caller already holds.
    pub async fn list_plans_on(
        &self,
        map: &Arc<ShardMap>,
        request: &PageRequest,
    ) -> QueryResult<Page<PlanSummary>> {
        validate::page_request(request, self.max_page_size)?;
        let comparator = PlanComparator::new(&request.sort);
        if !comparator.dropped().is_empty() {
            debug!(dropped = ?comparator.dropped(), "ignoring unknown sort fields");
        }

        let counts = self.fan_out(map, |store| store.count_plans()).await?;
        let total: u64 = counts.values().sum();
        if total == 0 {
            return Ok(Page::empty(request, 0));
        }

        let needed = request.offset + request.limit;
        let sort = request.sort.clone();
        let partials = self
            .fan_out(map, move |store| store.scan_plans(needed, &sort))
            .await?;

        let databases = partials.len();
        let mut merged: Vec<Plan> = partials.into_values().flatten().collect();
        comparator.sort(&mut merged);

        let content: Vec<PlanSummary> = merged
            .iter()
            .skip(request.offset)
            .take(request.limit)
            .map(Plan::summary)
            .collect();

        debug!(
            shards = databases,
            total,
            fetched = merged.len(),
            returned = content.len(),
            offset = request.offset,
            "plans listed"
        );

        Ok(Page {
            content,
            offset: request.offset,
            limit: request.limit,
            total_elements: total,
        })
    }

    /// Total number of plans across all shards.
    pub async fn count_plans(&self) -> QueryResult<u64> {
        let map = self.catalog.snapshot();
        let counts = self.fan_out(&map, |store| store.count_plans()).await?;
        Ok(counts.values().sum())
    }

    /// Plan and item counts per database, keyed by the lowest shard key
    /// mapped to it.
    pub async fn shard_stats(&self) -> QueryResult<BTreeMap<ShardKey, ShardStats>> {
        self.shard_stats_on(&self.catalog.snapshot()).await
    }

    pub async fn shard_stats_on(
        &self,
        map: &Arc<ShardMap>,
    ) -> QueryResult<BTreeMap<ShardKey, ShardStats>> {
        let stats = self.fan_out(map, |store| store.stats()).await?;
        info!(shards = stats.len(), "shard stats collected");
        Ok(stats)
    }

    /// Run `op` once against every distinct database of `map` in parallel.
    ///
    /// Each task binds its shard, acquires one connection, and runs the
    /// blocking store call off the async workers, all within the shard
    /// timeout. Results are keyed by the lowest key of each database.
    async fn fan_out<T, F>(
        &self,
        map: &Arc<ShardMap>,
        op: F,
    ) -> QueryResult<BTreeMap<ShardKey, T>>
    where
        T: Send + 'static,
        F: Fn(&ShardStore) -> StateResult<T> + Clone + Send + Sync + 'static,
    {
        let mut tasks = JoinSet::new();
        for shard in map.distinct_keys() {
            let map = Arc::clone(map);
            let op = op.clone();
            let timeout = self.shard_timeout;
            tasks.spawn(async move {
                let mut context = ShardContext::new();
                let bound = context.bind(shard);
                let query = query_shard(&map, &bound, op);
                let result = match tokio::time::timeout(timeout, query).await {
                    Ok(result) => result,
                    Err(_) => Err(QueryError::Timeout {
                        shard,
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                };
                (shard, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| QueryError::Task(e.to_string()));
            match outcome {
                Ok((shard, Ok(value))) => {
                    results.insert(shard, value);
                }
                Ok((_, Err(e))) | Err(e) => {
                    tasks.abort_all();
                    debug!(error = %e, "scatter-gather aborted");
                    return Err(e);
                }
            }
        }
        Ok(results)
    }
}

async fn query_shard<T, F>(map: &ShardMap, context: &ShardContext, op: F) -> QueryResult<T>
where
    T: Send + 'static,
    F: Fn(&ShardStore) -> StateResult<T> + Send + 'static,
{
    let Some(shard) = context.current() else {
        return Err(QueryError::Task("no shard bound to task".to_string()));
    };
    let pool = map
        .resolve(shard)
        .map_err(|source| QueryError::Shard { shard, source })?;
    let conn = pool
        .acquire()
        .await
        .map_err(|source| QueryError::Shard { shard, source })?;

    tokio::task::spawn_blocking(move || op(&conn))
        .await
        .map_err(|e| QueryError::Task(e.to_string()))?
        .map_err(|source| QueryError::State { shard, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;
    use waypoint_core::config::PoolConfig;
    use waypoint_core::{NewPlan, SortOrder, generate_id_for};
    use waypoint_shard::InlineSource;

    fn key(c: &str) -> ShardKey {
        c.parse().unwrap()
    }

    fn catalog(keys: &[&str]) -> Arc<ShardCatalog> {
        let rows: BTreeMap<String, String> = keys
            .iter()
            .map(|k| (k.to_string(), format!("memory://db_{k}")))
            .collect();
        let source = InlineSource::new(rows);
        let catalog = ShardCatalog::new(Box::new(source), PoolConfig::default(), None);
        catalog.reload().unwrap();
        Arc::new(catalog)
    }

    fn engine(catalog: Arc<ShardCatalog>) -> ScatterGather {
        ScatterGather::new(catalog, &QueryConfig::default())
    }

    async fn put(catalog: &ShardCatalog, shard: &str, title: &str, day: Option<u32>) -> Uuid {
        let mut plan = Plan::create(
            generate_id_for(key(shard)).unwrap(),
            NewPlan {
                title: title.to_string(),
                start_date: day.and_then(|d| NaiveDate::from_ymd_opt(2025, 3, d)),
                ..Default::default()
            },
            Utc::now(),
        );
        plan.budget = day.map(f64::from);
        let pool = catalog.resolve(key(shard)).unwrap();
        pool.acquire().await.unwrap().insert_plan(&plan).unwrap();
        plan.id
    }

    fn titles(page: &Page<PlanSummary>) -> Vec<&str> {
        page.content.iter().map(|p| p.title.as_str()).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn empty_catalog_lists_empty_page() {
        let catalog = catalog(&["0", "1"]);
        let page = engine(catalog)
            .list_plans(&PageRequest::new(0, 10))
            .await
            .unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn global_sort_and_window() {
        let catalog = catalog(&["0", "7", "c"]);
        put(&catalog, "0", "d", Some(4)).await;
        put(&catalog, "7", "a", Some(1)).await;
        put(&catalog, "c", "e", Some(5)).await;
        put(&catalog, "0", "b", Some(2)).await;
        put(&catalog, "7", "c", Some(3)).await;
        put(&catalog, "c", "undated", None).await;
        let engine = engine(catalog);

        let asc = engine
            .list_plans(&PageRequest::new(2, 2).sorted_by(SortOrder::asc("startDate")))
            .await
            .unwrap();
        assert_eq!(titles(&asc), ["c", "d"]);
        assert_eq!(asc.total_elements, 6);
        assert_eq!(asc.total_pages(), 3);

        let desc = engine
            .list_plans(&PageRequest::new(2, 2).sorted_by(SortOrder::desc("startDate")))
            .await
            .unwrap();
        assert_eq!(titles(&desc), ["c", "b"]);

        let tail = engine
            .list_plans(&PageRequest::new(4, 2).sorted_by(SortOrder::desc("startDate")))
            .await
            .unwrap();
        assert_eq!(titles(&tail), ["a", "undated"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn tie_breakers_and_case_insensitive_titles() {
        let catalog = catalog(&["1", "2"]);
        put(&catalog, "1", "beta", Some(1)).await;
        put(&catalog, "2", "Alpha", Some(1)).await;
        put(&catalog, "2", "alpha", Some(2)).await;
        let engine = engine(catalog);

        let page = engine
            .list_plans(
                &PageRequest::new(0, 10)
                    .sorted_by(SortOrder::asc("title"))
                    .sorted_by(SortOrder::desc("budget")),
            )
            .await
            .unwrap();
        let got: Vec<(&str, Option<f64>)> = page
            .content
            .iter()
            .map(|p| (p.title.as_str(), p.budget))
            .collect();
        assert_eq!(
            got,
            [("alpha", Some(2.0)), ("Alpha", Some(1.0)), ("beta", Some(1.0))]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn offset_past_end_and_unknown_fields() {
        let catalog = catalog(&["3"]);
        put(&catalog, "3", "only", Some(1)).await;
        let engine = engine(catalog);

        let page = engine
            .list_plans(&PageRequest::new(5, 5).sorted_by(SortOrder::asc("nonsense")))
            .await
            .unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 1);

        let page = engine
            .list_plans(&PageRequest::new(0, 5).sorted_by(SortOrder::asc("nonsense")))
            .await
            .unwrap();
        assert_eq!(titles(&page), ["only"]);
    }

    #[tokio::test]
    async fn invalid_window_rejected() {
        let engine = engine(catalog(&["0"]));
        assert!(matches!(
            engine.list_plans(&PageRequest::new(0, 0)).await,
            Err(QueryError::Invalid(_))
        ));
        assert!(matches!(
            engine.list_plans(&PageRequest::new(usize::MAX, 1)).await,
            Err(QueryError::Invalid(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_failing_shard_fails_the_listing() {
        let catalog = catalog(&["0", "1", "2"]);
        put(&catalog, "0", "x", None).await;
        catalog.resolve(key("1")).unwrap().close();
        let engine = engine(catalog);

        let err = engine
            .list_plans(&PageRequest::new(0, 10))
            .await
            .unwrap_err();
        assert_eq!(err.shard(), Some(key("1")));
        assert!(err.is_shard_failure());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exhausted_pool_times_out() {
        let catalog = catalog(&["0"]);
        let pool = catalog.resolve(key("0")).unwrap();
        let mut held = Vec::new();
        for _ in 0..pool.max_connections() {
            held.push(pool.acquire().await.unwrap());
        }
        let engine = ScatterGather::new(
            catalog,
            &QueryConfig {
                shard_timeout_ms: 20,
                ..Default::default()
            },
        );

        let err = engine.count_plans().await.unwrap_err();
        assert!(matches!(err, QueryError::Timeout { timeout_ms: 20, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shared_endpoint_is_visited_once() {
        let rows: BTreeMap<String, String> = [
            ("0", "memory://db_x"),
            ("1", "memory://db_x"),
            ("2", "memory://db_y"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let source = InlineSource::new(rows);
        let catalog = ShardCatalog::new(Box::new(source), PoolConfig::default(), None);
        catalog.reload().unwrap();
        let catalog = Arc::new(catalog);
        let only = put(&catalog, "0", "only", Some(1)).await;
        put(&catalog, "2", "other", Some(2)).await;

        let engine = engine(Arc::clone(&catalog));
        let page = engine
            .list_plans(&PageRequest::new(0, 10).sorted_by(SortOrder::asc("startDate")))
            .await
            .unwrap();
        assert_eq!(page.total_elements, 2);
        assert_eq!(titles(&page), ["only", "other"]);
        assert_eq!(page.content[0].id, only);

        let stats = engine.shard_stats().await.unwrap();
        assert_eq!(stats.keys().copied().collect::<Vec<_>>(), [key("0"), key("2")]);
        assert_eq!(engine.count_plans().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stats_per_shard() {
        let catalog = catalog(&["0", "a"]);
        put(&catalog, "a", "one", None).await;
        put(&catalog, "a", "two", None).await;
        let stats = engine(catalog).shard_stats().await.unwrap();
        assert_eq!(stats[&key("0")].plans, 0);
        assert_eq!(stats[&key("a")].plans, 2);
    }
}
