use oshub_result::errors::BoxedErr;
use oshub_telemetry_worker::server::TelemetryWorkerServer;

#[tokio::main]
async fn main() -> Result<(), BoxedErr> {
  let server = TelemetryWorkerServer::new().await;

  match server {
    Ok(srv) => return srv.run().await,
    Err(e) => Err(e),
  }
}
