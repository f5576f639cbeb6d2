//! A [`ThinSearch`] adapter over a local `tantivy` index, used for the
//! standalone binary and for integration tests that want a real (if small)
//! index instead of a scripted double. The teacher depends on a richer
//! search engine behind its own `search` crate; we go straight to `tantivy`
//! (the same git fork the workspace already pins) since `search` itself
//! drags in the out-of-scope `common`/`value` type system.

use async_trait::async_trait;
use futures::stream::{
    self,
    BoxStream,
};
use tantivy::{
    collector::Count,
    directory::MmapDirectory,
    query::{
        AllQuery,
        BooleanQuery,
        Occur,
        Query as TantivyQuery,
        RangeQuery,
        TermQuery,
    },
    schema::{
        Field,
        IndexRecordOption,
        Schema,
        SchemaBuilder,
        Value,
        FAST,
        INDEXED,
        STORED,
        STRING,
    },
    Index,
    IndexReader,
    TantivyDocument,
};

use super::{
    Pagination,
    ProbeResult,
    Sort,
    ThinSearch,
};
use crate::{
    model::{
        Comparator,
        FieldFilter,
        IndexTime,
        ThinSearchParams,
    },
    record_source::{
        ScrollResult,
        ScrollSource,
        ScrolledRecord,
    },
};

/// Field names fixed by this adapter's schema. A production deployment would
/// derive these from the corpus' own schema service; here they're just the
/// columns a record needs to participate in bulk consume.
pub struct TantivyThinSearch {
    index: Index,
    reader: IndexReader,
    index_time_field: Field,
    path_field: Field,
    deleted_field: Field,
}

impl TantivyThinSearch {
    pub fn open_or_create(dir: &std::path::Path) -> anyhow::Result<Self> {
        let mut builder = SchemaBuilder::new();
        let index_time_field = builder.add_i64_field("indexTime", INDEXED | FAST | STORED);
        let path_field = builder.add_text_field("path", STRING | STORED);
        let deleted_field = builder.add_bool_field("deleted", INDEXED | FAST);
        let schema = builder.build();

        let directory = MmapDirectory::open(dir)?;
        let index = Index::open_or_create(directory, schema)?;
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            index_time_field,
            path_field,
            deleted_field,
        })
    }

    fn build_query(&self, params: &ThinSearchParams) -> anyhow::Result<Box<dyn TantivyQuery>> {
        let mut clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = Vec::new();

        if let Some(path_filter) = &params.path_filter {
            let term = tantivy::Term::from_field_text(self.path_field, &path_filter.path);
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }
        if !params.with_deleted {
            let term = tantivy::Term::from_field_bool(self.deleted_field, false);
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }
        if let Some(filter) = &params.field_filter {
            clauses.push((Occur::Must, self.build_field_filter(filter)?));
        }

        if clauses.is_empty() {
            Ok(Box::new(AllQuery))
        } else {
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
    }

    fn build_field_filter(&self, filter: &FieldFilter) -> anyhow::Result<Box<dyn TantivyQuery>> {
        match filter {
            FieldFilter::Must(parts) => {
                let clauses = parts
                    .iter()
                    .map(|p| Ok((Occur::Must, self.build_field_filter(p)?)))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(Box::new(BooleanQuery::new(clauses)))
            },
            FieldFilter::Should(parts) => {
                let clauses = parts
                    .iter()
                    .map(|p| Ok((Occur::Should, self.build_field_filter(p)?)))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(Box::new(BooleanQuery::new(clauses)))
            },
            FieldFilter::MustNot(inner) => Ok(Box::new(BooleanQuery::new(vec![
                (Occur::Must, Box::new(AllQuery)),
                (Occur::MustNot, self.build_field_filter(inner)?),
            ]))),
            FieldFilter::Leaf {
                field,
                comparator,
                value,
            } => self.build_leaf(field, comparator, value.as_deref()),
        }
    }

    fn build_leaf(
        &self,
        field: &str,
        comparator: &Comparator,
        value: Option<&str>,
    ) -> anyhow::Result<Box<dyn TantivyQuery>> {
        if field == "indexTime" {
            let bound: i64 = value
                .ok_or_else(|| anyhow::anyhow!("indexTime comparator requires a value"))?
                .parse()?;
            return Ok(match comparator {
                Comparator::Gte => Box::new(RangeQuery::new_i64_bounds(
                    self.index_time_field,
                    std::ops::Bound::Included(bound),
                    std::ops::Bound::Unbounded,
                )),
                Comparator::Lt => Box::new(RangeQuery::new_i64_bounds(
                    self.index_time_field,
                    std::ops::Bound::Unbounded,
                    std::ops::Bound::Excluded(bound),
                )),
                other => anyhow::bail!("unsupported indexTime comparator {other:?}"),
            });
        }
        anyhow::bail!("unknown field filter leaf field {field}")
    }
}

#[async_trait]
impl ThinSearch for TantivyThinSearch {
    async fn probe(
        &self,
        params: &ThinSearchParams,
        pagination: Pagination,
        sort: Option<Sort>,
    ) -> anyhow::Result<ProbeResult> {
        let query = self.build_query(params)?;
        let searcher = self.reader.searcher();
        let total = searcher.search(&query, &Count)? as u64;

        let first_index_time = if sort == Some(Sort::IndexTimeAsc) {
            let limit = pagination.offset as usize + pagination.limit as usize;
            let collector = tantivy::collector::TopDocs::with_limit(limit).order_by_fast_field::<i64>(
                "indexTime",
                tantivy::Order::Asc,
            );
            let hits = searcher.search(&query, &collector)?;
            hits.into_iter()
                .nth(pagination.offset as usize)
                .map(|(_score, addr)| {
                    let doc: TantivyDocument = searcher.doc(addr).expect("doc address from this searcher");
                    doc.get_first(self.index_time_field)
                        .and_then(|v| v.as_i64())
                        .expect("indexTime is a required FAST field")
                })
        } else {
            None
        };

        Ok(ProbeResult {
            total,
            first_index_time,
        })
    }
}

#[async_trait]
impl ScrollSource for TantivyThinSearch {
    async fn scroll(
        &self,
        params: &ThinSearchParams,
        from: IndexTime,
        to: IndexTime,
    ) -> anyhow::Result<(ScrollResult, BoxStream<'static, anyhow::Result<ScrolledRecord>>)> {
        let bounded = ThinSearchParams {
            path_filter: params.path_filter.clone(),
            field_filter: Some(FieldFilter::conjoin_time_range(params.field_filter.clone(), from, to)),
            with_history: params.with_history,
            with_deleted: params.with_deleted,
        };
        let query = self.build_query(&bounded)?;
        let searcher = self.reader.searcher();
        let addresses = searcher.search(&query, &tantivy::collector::DocSetCollector)?;

        let mut records = Vec::with_capacity(addresses.len());
        for addr in addresses {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let path = doc
                .get_first(self.path_field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let index_time = doc
                .get_first(self.index_time_field)
                .and_then(|v| v.as_i64())
                .unwrap_or(from);
            let deleted = doc
                .get_first(self.deleted_field)
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            records.push(Ok(ScrolledRecord {
                subject: path.clone(),
                path,
                index_time,
                deleted,
                data: None,
            }));
        }
        let hits = records.len() as u64;
        Ok((ScrollResult { hits }, Box::pin(stream::iter(records))))
    }
}
