use chassis_transport::TransportError;
use std::io;

/// 描述一次底层操作对应的稳定错误码与默认文案。
#[derive(Clone, Copy)]
pub(crate) struct OperationKind {
    pub code: &'static str,
    pub message: &'static str,
}

pub(crate) const BIND: OperationKind = OperationKind {
    code: "chassis.transport.tcp.bind_failed",
    message: "tcp bind",
};
pub(crate) const ACCEPT: OperationKind = OperationKind {
    code: "chassis.transport.tcp.accept_failed",
    message: "tcp accept",
};
pub(crate) const CONNECT: OperationKind = OperationKind {
    code: "chassis.transport.tcp.connect_failed",
    message: "tcp connect",
};
pub(crate) const RESOLVE: OperationKind = OperationKind {
    code: "chassis.transport.tcp.resolve_failed",
    message: "tcp resolve",
};
pub(crate) const WRITE_VECTORED: OperationKind = OperationKind {
    code: "chassis.transport.tcp.writev_failed",
    message: "tcp write_vectored",
};
pub(crate) const SHUTDOWN: OperationKind = OperationKind {
    code: "chassis.transport.tcp.shutdown_failed",
    message: "tcp shutdown",
};
pub(crate) const CONFIGURE: OperationKind = OperationKind {
    code: "chassis.transport.tcp.configure_failed",
    message: "tcp configure",
};

const TIMEOUT_CODE: &str = "chassis.transport.tcp.timeout";

/// 将 IO 错误映射为传输错误，附带稳定错误码。
pub(crate) fn map_io_error(kind: OperationKind, error: io::Error) -> TransportError {
    TransportError::io(kind.code, kind.message, error)
}

/// 构造超时错误。
pub(crate) fn timeout_error(kind: OperationKind) -> TransportError {
    TransportError::timeout(TIMEOUT_CODE, kind.message)
}
