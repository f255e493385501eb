mod dimension_test;
mod fact_test;
mod pipeline_test;
mod postgres_test;
mod staging_test;
