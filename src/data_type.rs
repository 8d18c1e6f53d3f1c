use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// A value that can be used as the key of an nf_tables set. `TYPE` is the nft data type
/// identifier the kernel stores along with the set, `LEN` the fixed size of every key.
pub trait DataType {
    const TYPE: u32;
    const LEN: u32;

    fn data(&self) -> Vec<u8>;
}

impl DataType for Ipv4Addr {
    const TYPE: u32 = 7;
    const LEN: u32 = 4;

    fn data(&self) -> Vec<u8> {
        self.octets().to_vec()
    }
}

impl DataType for Ipv6Addr {
    const TYPE: u32 = 8;
    const LEN: u32 = 16;

    fn data(&self) -> Vec<u8> {
        self.octets().to_vec()
    }
}

/// A transport layer port, stored in network byte order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct InetService(pub u16);

impl DataType for InetService {
    const TYPE: u32 = 13;
    const LEN: u32 = 2;

    fn data(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }
}

/// Raw bytes of an address, 4 bytes for IPv4 and 16 for IPv6.
pub fn ip_to_vec(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(x) => x.data(),
        IpAddr::V6(x) => x.data(),
    }
}
