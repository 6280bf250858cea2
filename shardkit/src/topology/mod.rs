pub mod port;
pub mod resolver;

pub use port::{
    build_port_resolver, FixedPortResolver, HttpPortResolver, IdentityPortResolver, PortResolution,
    PortResolver,
};
pub use resolver::{TopologyResolver, QUERY_CLUSTER_INFO_SQL};
