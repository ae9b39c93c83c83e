//! hMetis hypergraph file format.
//!
//! Header: `|E| |V| [fmt]` with `fmt` in `{0, 1, 10, 11}`; `fmt & 1` means
//! each net line starts with a weight, `fmt & 10` means `|V|` vertex-weight
//! lines follow the nets. Pins are 1-based. Lines starting with `%` are
//! comments.

use std::io::BufRead;
use std::path::Path;

use crate::error::PartitionError;
use crate::hypergraph::{EdgeWeight, Hypergraph, NodeWeight};

/// CSR-style parse result, also exposed through the C ABI.
#[derive(Debug, Clone)]
pub struct CsrHypergraph {
    pub num_nodes: usize,
    /// `|E| + 1` offsets into `pins`.
    pub edge_indices: Vec<usize>,
    /// 0-based pin ids.
    pub pins: Vec<u64>,
    pub edge_weights: Vec<EdgeWeight>,
    pub node_weights: Vec<NodeWeight>,
}

impl CsrHypergraph {
    pub fn num_edges(&self) -> usize {
        self.edge_indices.len() - 1
    }

    pub fn to_hypergraph(&self) -> Result<Hypergraph, PartitionError> {
        Hypergraph::from_csr(
            self.num_nodes,
            &self.edge_indices,
            &self.pins,
            Some(&self.edge_weights),
            Some(&self.node_weights),
        )
    }
}

/// Read an hMetis file from disk.
pub fn read_hypergraph_file<P: AsRef<Path>>(path: P) -> Result<CsrHypergraph, PartitionError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| PartitionError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    read_hypergraph(std::io::BufReader::new(file)).map_err(|e| match e {
        PartitionError::Io { message, .. } => PartitionError::Io {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

/// Read an hMetis stream.
pub fn read_hypergraph<R: BufRead>(reader: R) -> Result<CsrHypergraph, PartitionError> {
    let mut lines = reader.lines().filter_map(|line| match line {
        Ok(l) => {
            let trimmed = l.trim().to_string();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                None
            } else {
                Some(Ok(trimmed))
            }
        }
        Err(e) => Some(Err(PartitionError::Io {
            path: String::from("<stream>"),
            message: e.to_string(),
        })),
    });

    let header = lines
        .next()
        .ok_or_else(|| PartitionError::InvalidHeader("empty file".into()))??;
    let mut fields = header.split_whitespace();
    let num_edges: usize = parse_field(fields.next(), &header)?;
    let num_nodes: usize = parse_field(fields.next(), &header)?;
    let fmt = fields.next().unwrap_or("0");
    let (has_edge_weights, has_node_weights) = match fmt {
        "0" => (false, false),
        "1" => (true, false),
        "10" => (false, true),
        "11" => (true, true),
        other => {
            return Err(PartitionError::InvalidHeader(format!(
                "unknown format tag `{other}`"
            )))
        }
    };

    let mut edge_indices = Vec::with_capacity(num_edges + 1);
    let mut pins: Vec<u64> = Vec::new();
    let mut edge_weights = Vec::with_capacity(num_edges);
    edge_indices.push(0);
    for e in 0..num_edges {
        let line = lines.next().ok_or_else(|| {
            PartitionError::InvalidHeader(format!("missing line for hyperedge {e}"))
        })??;
        let mut tokens = line.split_whitespace();
        let weight: EdgeWeight = if has_edge_weights {
            parse_field(tokens.next(), &line)?
        } else {
            1
        };
        for token in tokens {
            let pin: u64 = token
                .parse()
                .map_err(|_| PartitionError::InvalidHeader(format!("bad pin `{token}`")))?;
            if pin == 0 || pin > num_nodes as u64 {
                return Err(PartitionError::PinOutOfRange {
                    hyperedge: e,
                    pin,
                    num_nodes,
                });
            }
            pins.push(pin - 1);
        }
        if pins.len() == *edge_indices.last().unwrap() {
            return Err(PartitionError::InvalidHeader(format!(
                "hyperedge {e} has no pins"
            )));
        }
        edge_indices.push(pins.len());
        edge_weights.push(weight);
    }

    let node_weights = if has_node_weights {
        let mut ws = Vec::with_capacity(num_nodes);
        for u in 0..num_nodes {
            let line = lines.next().ok_or_else(|| {
                PartitionError::InvalidHeader(format!("missing weight for vertex {u}"))
            })??;
            ws.push(parse_field(line.split_whitespace().next(), &line)?);
        }
        ws
    } else {
        vec![1; num_nodes]
    };

    Ok(CsrHypergraph {
        num_nodes,
        edge_indices,
        pins,
        edge_weights,
        node_weights,
    })
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: &str) -> Result<T, PartitionError> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| PartitionError::InvalidHeader(format!("malformed line `{line}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_unweighted_instance() {
        let input = "% toy instance\n4 7 0\n1 2\n1 7 5 6\n5 6 4\n2 3 4\n";
        let csr = read_hypergraph(input.as_bytes()).unwrap();
        assert_eq!(csr.num_edges(), 4);
        assert_eq!(csr.num_nodes, 7);
        assert_eq!(csr.pins[..2], [0, 1]);
        assert_eq!(csr.edge_weights, vec![1; 4]);
        let hg = csr.to_hypergraph().unwrap();
        assert_eq!(hg.initial_num_pins(), 12);
    }

    #[test]
    fn reads_fully_weighted_instance() {
        let input = "2 3 11\n4 1 2\n9 2 3\n5\n6\n7\n";
        let csr = read_hypergraph(input.as_bytes()).unwrap();
        assert_eq!(csr.edge_weights, vec![4, 9]);
        assert_eq!(csr.node_weights, vec![5, 6, 7]);
        let hg = csr.to_hypergraph().unwrap();
        assert_eq!(hg.total_weight(), 18);
        assert_eq!(hg.edge_weight(1), 9);
    }

    #[test]
    fn rejects_out_of_range_pins() {
        let input = "1 3 0\n1 4\n";
        assert!(matches!(
            read_hypergraph(input.as_bytes()),
            Err(PartitionError::PinOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_bad_header() {
        assert!(matches!(
            read_hypergraph("3 x 0\n".as_bytes()),
            Err(PartitionError::InvalidHeader(_))
        ));
        assert!(matches!(
            read_hypergraph("2 3 7\n1 2\n2 3\n".as_bytes()),
            Err(PartitionError::InvalidHeader(_))
        ));
    }
}
