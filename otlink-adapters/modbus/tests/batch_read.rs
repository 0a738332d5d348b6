use async_trait::async_trait;
use otlink_adapter_modbus::read_register_targets;
use otlink_sdk::{ModbusFunctionCode, ModbusValues, RegisterTarget};
use std::io;
use tokio_modbus::{
    client::{Client, Context},
    slave::{Slave, SlaveContext},
    ExceptionCode, Request, Response,
};

/// In-memory slave that answers reads with a deterministic pattern and can
/// be told to raise a Modbus exception or fail at the transport level for
/// specific addresses.
#[derive(Debug, Default)]
struct FakeSlave {
    exception_addrs: Vec<u16>,
    dead_addrs: Vec<u16>,
}

impl FakeSlave {
    fn respond(
        &self,
        addr: u16,
        ok: impl FnOnce() -> Response,
    ) -> tokio_modbus::Result<Response> {
        if self.dead_addrs.contains(&addr) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down").into());
        }
        if self.exception_addrs.contains(&addr) {
            return Ok(Err(ExceptionCode::IllegalDataAddress));
        }
        Ok(Ok(ok()))
    }
}

impl SlaveContext for FakeSlave {
    fn set_slave(&mut self, _slave: Slave) {}
}

#[async_trait]
impl Client for FakeSlave {
    async fn call(&mut self, request: Request<'_>) -> tokio_modbus::Result<Response> {
        match request {
            Request::ReadCoils(addr, cnt) => self.respond(addr, || {
                Response::ReadCoils((0..cnt).map(|i| (addr + i) % 2 == 0).collect())
            }),
            Request::ReadDiscreteInputs(addr, cnt) => self.respond(addr, || {
                Response::ReadDiscreteInputs((0..cnt).map(|i| (addr + i) % 2 == 1).collect())
            }),
            Request::ReadHoldingRegisters(addr, cnt) => self.respond(addr, || {
                Response::ReadHoldingRegisters((0..cnt).map(|i| addr + i).collect())
            }),
            Request::ReadInputRegisters(addr, cnt) => self.respond(addr, || {
                Response::ReadInputRegisters((0..cnt).map(|i| 1000 + addr + i).collect())
            }),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn holding_targets(addresses: &[u16]) -> Vec<RegisterTarget> {
    addresses
        .iter()
        .map(|a| RegisterTarget {
            address: *a,
            function_code: ModbusFunctionCode::ReadHoldingRegisters,
            quantity: 1,
        })
        .collect()
}

#[tokio::test]
async fn mid_batch_exception_does_not_abort_remaining_addresses() {
    let mut ctx = Context::from(Box::new(FakeSlave {
        exception_addrs: vec![2],
        ..Default::default()
    }) as Box<dyn Client>);
    let targets = holding_targets(&[0, 1, 2, 3, 4]);

    let batch = read_register_targets(&mut ctx, &targets).await;

    assert!(batch.link_healthy);
    assert_eq!(batch.samples.len(), 5);
    for (i, sample) in batch.samples.iter().enumerate() {
        if i == 2 {
            assert!(sample.values.is_none());
            let err = sample.error.as_deref().expect("error entry for address 2");
            assert!(err.contains("exception"), "unexpected error text: {err}");
        } else {
            assert_eq!(
                sample.values,
                Some(ModbusValues::Registers {
                    words: vec![sample.address]
                })
            );
            assert!(sample.error.is_none());
        }
    }
}

#[tokio::test]
async fn transport_error_is_recorded_and_marks_the_link_dead() {
    let mut ctx = Context::from(Box::new(FakeSlave {
        dead_addrs: vec![1],
        ..Default::default()
    }) as Box<dyn Client>);
    let targets = holding_targets(&[0, 1, 2]);

    let batch = read_register_targets(&mut ctx, &targets).await;

    assert!(!batch.link_healthy);
    assert_eq!(batch.samples.len(), 3);
    assert!(batch.samples[0].values.is_some());
    assert!(batch.samples[1]
        .error
        .as_deref()
        .unwrap()
        .contains("transport"));
    assert!(batch.samples[2].values.is_some());
}

#[tokio::test]
async fn coil_and_discrete_reads_decode_to_bits() {
    let mut ctx = Context::from(Box::new(FakeSlave::default()) as Box<dyn Client>);
    let targets = vec![
        RegisterTarget {
            address: 0,
            function_code: ModbusFunctionCode::ReadCoils,
            quantity: 2,
        },
        RegisterTarget {
            address: 0,
            function_code: ModbusFunctionCode::ReadDiscreteInputs,
            quantity: 2,
        },
    ];

    let batch = read_register_targets(&mut ctx, &targets).await;

    assert_eq!(
        batch.samples[0].values,
        Some(ModbusValues::Coils {
            bits: vec![true, false]
        })
    );
    assert_eq!(
        batch.samples[1].values,
        Some(ModbusValues::Coils {
            bits: vec![false, true]
        })
    );
}
