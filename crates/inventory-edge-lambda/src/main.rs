//! AWS Lambda function serving the inventory API from API Gateway proxy
//! events.

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    inventory_edge_lambda::run().await
}
