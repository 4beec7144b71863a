//! ADNL address lists published by nodes and stored under `address` keys.

use std::fmt::{self, Display, Formatter};
use std::net::{Ipv4Addr, SocketAddrV4};

use super::tl::{DecodeError, Reader, Schema, Writer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A UDP endpoint, with the IPv4 address stored as a signed big endian integer.
pub struct UdpAddress {
    pub ip: i32,
    pub port: i32,
}

impl UdpAddress {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip: u32::from(ip) as i32,
            port: port as i32,
        }
    }

    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip as u32)
    }

    /// Returns `None` if the port is out of range.
    pub fn socket_addr(&self) -> Option<SocketAddrV4> {
        u16::try_from(self.port)
            .ok()
            .map(|port| SocketAddrV4::new(self.ip(), port))
    }
}

impl Display for UdpAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip(), self.port)
    }
}

impl Schema for UdpAddress {
    const SCHEMA: &'static str = "adnl.address.udp ip:int port:int = adnl.Address";

    fn write_fields(&self, w: &mut Writer) {
        w.i32(self.ip);
        w.i32(self.port);
    }

    fn read_fields(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            ip: r.i32()?,
            port: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// The list of endpoints a node or an ADNL address can be reached at.
pub struct AddressList {
    pub addresses: Vec<UdpAddress>,
    pub version: i32,
    pub reinit_date: i32,
    pub priority: i32,
    pub expire_at: i32,
}

impl AddressList {
    /// The preferred endpoint, formatted as `ip:port`.
    pub fn first_address(&self) -> Option<String> {
        self.addresses.first().map(|address| address.to_string())
    }
}

impl Schema for AddressList {
    const SCHEMA: &'static str = "adnl.addressList addrs:vector adnl.Address version:int reinit_date:int priority:int expire_at:int = adnl.AddressList";

    fn write_fields(&self, w: &mut Writer) {
        w.vector(&self.addresses, |w, address| w.boxed(address));
        w.i32(self.version);
        w.i32(self.reinit_date);
        w.i32(self.priority);
        w.i32(self.expire_at);
    }

    fn read_fields(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            addresses: r.vector(|r| r.boxed())?,
            version: r.i32()?,
            reinit_date: r.i32()?,
            priority: r.i32()?,
            expire_at: r.i32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::tl;

    use base64::{engine::general_purpose::STANDARD, Engine as _};

    #[test]
    fn decode_published_address_list() {
        let data = STANDARD
            .decode("WOYnIgEAAADnpg1nkp5cpAUNAAD6Zphj+maYYwAAAAAAAAAA")
            .unwrap();

        let list: AddressList = tl::from_bytes(&data).unwrap();

        assert_eq!(list.addresses.len(), 1);
        assert_eq!(list.addresses[0].to_string(), "164.92.158.146:3333");
        assert_eq!(list.version, 1670932218);
        assert_eq!(list.reinit_date, 1670932218);

        assert_eq!(tl::to_bytes(&list), data);
    }

    #[test]
    fn negative_ip_renders_as_dotted_quad() {
        let address = UdpAddress {
            ip: -1185526007,
            port: 22096,
        };

        assert_eq!(address.to_string(), "185.86.79.9:22096");
        assert_eq!(
            UdpAddress::new(Ipv4Addr::new(185, 86, 79, 9), 22096),
            address
        );
    }

    #[test]
    fn out_of_range_port() {
        let address = UdpAddress {
            ip: 0,
            port: 333333,
        };

        assert_eq!(address.socket_addr(), None);
    }
}
