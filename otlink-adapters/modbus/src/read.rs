use otlink_sdk::{ModbusFunctionCode, ModbusSample, ModbusValues, RegisterTarget};
use tokio_modbus::client::{Context, Reader};
use tracing::warn;

/// Outcome of one pass over a target list.
pub struct BatchRead {
    pub samples: Vec<ModbusSample>,
    /// False when at least one failure was transport-level rather than a
    /// device exception. The owning handle is then considered dead.
    pub link_healthy: bool,
}

/// Read each target address individually, one request at a time via the
/// appropriate read function code.
///
/// Two failure classes are kept apart: a Modbus exception is the device
/// answering "no" for that address — recorded on the sample, batch
/// continues; a transport error is recorded the same way but also clears
/// `link_healthy` so the pool evicts the handle on its next lookup. No
/// failure short-circuits the remaining addresses.
pub async fn read_register_targets(ctx: &mut Context, targets: &[RegisterTarget]) -> BatchRead {
    let mut samples = Vec::with_capacity(targets.len());
    let mut link_healthy = true;

    for target in targets {
        let quantity = target.quantity.max(1);
        let outcome = match target.function_code {
            ModbusFunctionCode::ReadCoils => ctx
                .read_coils(target.address, quantity)
                .await
                .map(|r| r.map(|bits| ModbusValues::Coils { bits })),
            ModbusFunctionCode::ReadDiscreteInputs => ctx
                .read_discrete_inputs(target.address, quantity)
                .await
                .map(|r| r.map(|bits| ModbusValues::Coils { bits })),
            ModbusFunctionCode::ReadHoldingRegisters => ctx
                .read_holding_registers(target.address, quantity)
                .await
                .map(|r| r.map(|words| ModbusValues::Registers { words })),
            ModbusFunctionCode::ReadInputRegisters => ctx
                .read_input_registers(target.address, quantity)
                .await
                .map(|r| r.map(|words| ModbusValues::Registers { words })),
        };

        match outcome {
            Ok(Ok(values)) => samples.push(ModbusSample::ok(target, values)),
            Ok(Err(code)) => {
                warn!(
                    address = target.address,
                    code = ?code,
                    "Modbus exception, continuing batch"
                );
                samples.push(ModbusSample::failed(
                    target,
                    format!("Modbus exception: {code:?}"),
                ));
            }
            Err(e) => {
                warn!(
                    address = target.address,
                    error = %e,
                    "Modbus transport error, continuing batch on suspect link"
                );
                link_healthy = false;
                samples.push(ModbusSample::failed(
                    target,
                    format!("Modbus transport error: {e}"),
                ));
            }
        }
    }

    BatchRead {
        samples,
        link_healthy,
    }
}
