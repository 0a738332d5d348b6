use crate::read::read_register_targets;
use async_trait::async_trait;
use otlink_sdk::{
    AdapterError, AdapterResult, ConnectionConfig, DataBits, LiveHandle, ModbusConfig,
    ModbusTransport, Parity, Protocol, ProtocolAdapter, ReadRequest, ReadResult, StopBits,
};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::Mutex, time::timeout};
use tokio_modbus::{
    client::{rtu, tcp, Client as _, Context},
    slave::Slave,
};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, instrument, warn};

/// Live Modbus context behind an async mutex: one outstanding request at a
/// time per handle, matching the protocol's request/response discipline.
pub struct ModbusHandle {
    ctx: Mutex<Context>,
    /// Cleared when a read hits a transport-level error
    healthy: AtomicBool,
    endpoint: String,
}

impl LiveHandle for ModbusHandle {}

/// Modbus TCP/RTU protocol adapter
#[derive(Default)]
pub struct ModbusAdapter;

impl ModbusAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn connect_once(cfg: &ModbusConfig) -> AdapterResult<(Context, String)> {
        match &cfg.transport {
            ModbusTransport::Tcp { host, port } => {
                let addr = format!("{}:{}", host, port)
                    .parse::<SocketAddr>()
                    .map_err(|e| {
                        AdapterError::ConfigError(format!("Invalid socket address: {e}"))
                    })?;
                let ctx = match cfg.unit_id {
                    Some(unit) => tcp::connect_slave(addr, Slave(unit)).await,
                    None => tcp::connect(addr).await,
                }
                .map_err(|e| AdapterError::ConnectError(format!("Modbus TCP connect error: {e}")))?;
                Ok((ctx, format!("{host}:{port}")))
            }
            ModbusTransport::Rtu {
                serial_port,
                baud_rate,
                data_bits,
                stop_bits,
                parity,
            } => {
                let builder = tokio_serial::new(serial_port, *baud_rate)
                    .data_bits(map_data_bits(*data_bits))
                    .stop_bits(map_stop_bits(*stop_bits))
                    .parity(map_parity(*parity));
                let stream = builder.open_native_async().map_err(|e| {
                    AdapterError::ConnectError(format!(
                        "Failed to open serial port {serial_port}: {e}"
                    ))
                })?;
                let ctx = match cfg.unit_id {
                    Some(unit) => rtu::attach_slave(stream, Slave(unit)),
                    None => rtu::attach(stream),
                };
                Ok((ctx, serial_port.clone()))
            }
        }
    }
}

#[async_trait]
impl ProtocolAdapter for ModbusAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Modbus
    }

    #[instrument(level = "debug", skip_all)]
    async fn connect(&self, config: &ConnectionConfig) -> AdapterResult<Arc<dyn LiveHandle>> {
        let ConnectionConfig::Modbus(cfg) = config else {
            return Err(AdapterError::ConfigError(
                "Modbus adapter received a non-Modbus config".to_string(),
            ));
        };
        let (ctx, endpoint) = Self::connect_once(cfg).await?;
        debug!(endpoint = %endpoint, unit = ?cfg.unit_id, "Modbus transport opened");
        Ok(Arc::new(ModbusHandle {
            ctx: Mutex::new(ctx),
            healthy: AtomicBool::new(true),
            endpoint,
        }))
    }

    /// Modbus has no cheap protocol-level probe. Liveness is inferred from
    /// read outcomes; this only reports the flag the read path maintains.
    async fn verify_live(&self, handle: &Arc<dyn LiveHandle>) -> bool {
        handle
            .downcast_ref::<ModbusHandle>()
            .map(|h| h.healthy.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    #[instrument(level = "debug", skip_all)]
    async fn read(
        &self,
        handle: &Arc<dyn LiveHandle>,
        request: &ReadRequest,
    ) -> AdapterResult<ReadResult> {
        let handle =
            handle
                .downcast_ref::<ModbusHandle>()
                .ok_or(AdapterError::SessionError(
                    "handle is not a Modbus handle".to_string(),
                ))?;
        let ReadRequest::Modbus { targets } = request else {
            return Err(AdapterError::ConfigError(
                "Modbus adapter received a non-Modbus read request".to_string(),
            ));
        };

        let mut ctx = handle.ctx.lock().await;
        let batch = read_register_targets(&mut ctx, targets).await;
        drop(ctx);

        if !batch.link_healthy {
            warn!(endpoint = %handle.endpoint, "Modbus link marked unhealthy after transport error");
            handle.healthy.store(false, Ordering::Release);
        }
        Ok(ReadResult::Modbus(batch.samples))
    }

    async fn disconnect(&self, handle: Arc<dyn LiveHandle>) {
        let Some(handle) = handle.downcast_ref::<ModbusHandle>() else {
            return;
        };
        let res = timeout(Duration::from_secs(2), async {
            let mut ctx = handle.ctx.lock().await;
            ctx.disconnect().await
        })
        .await;
        match res {
            Ok(Ok(())) => debug!(endpoint = %handle.endpoint, "Modbus transport closed"),
            Ok(Err(e)) => debug!(endpoint = %handle.endpoint, error = %e, "Modbus disconnect failed"),
            Err(_) => debug!(endpoint = %handle.endpoint, "Modbus disconnect timed out"),
        }
    }
}

fn map_data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Five => tokio_serial::DataBits::Five,
        DataBits::Six => tokio_serial::DataBits::Six,
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn map_stop_bits(bits: StopBits) -> tokio_serial::StopBits {
    match bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}

fn map_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}
