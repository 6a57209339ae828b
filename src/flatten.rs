//! Hierarchy → flat topic list.
//!
//! Walks `categories → subcategories → topics` through a [`DataSource`] and
//! returns every topic tagged with the category and subcategory it was found
//! under. Order is the store's enumeration order; presentation ordering is
//! the pipeline's job.
//!
//! Any listing failure aborts the whole fetch. There is no partial result.

use crate::store::{DataSource, StoreError};
use crate::topic::Topic;

/// Fetch and flatten every topic in the store.
pub fn fetch_all_topics(source: &dyn DataSource) -> Result<Vec<Topic>, StoreError> {
    let mut topics = Vec::new();

    for category in source.categories()? {
        for subcategory in source.subcategories(&category)? {
            let documents = source.topics(&category, &subcategory)?;
            tracing::debug!(
                %category,
                %subcategory,
                count = documents.len(),
                "Listed topics"
            );
            topics.extend(
                documents
                    .into_iter()
                    .map(|doc| Topic::from_document(doc, &category, &subcategory)),
            );
        }
    }

    Ok(topics)
}
