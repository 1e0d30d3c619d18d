//! Arrow schema for the passage table. The vector column width is fixed by
//! the embedding provider and recorded in the generation manifest.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

pub fn passage_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("page", DataType::Int32, false),
        Field::new("seq", DataType::Int32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}
