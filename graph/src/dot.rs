use std::io::{Result, Write};

use swh_model::ExtendedSwhid;

/// Minimal GraphViz DOT emitter, producing a textual format meant for
/// `dot -Tsvg`, not a terminal.
pub struct DotWriter<W: Write> {
    out: W,
}

impl<W: Write> DotWriter<W> {
    pub fn new(out: W) -> Self {
        DotWriter { out }
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.out, "digraph Subgraph {{")?;
        writeln!(self.out, "    node [shape=box, fontname=monospace];")
    }

    pub fn write_vertex(&mut self, swhid: &ExtendedSwhid, label_suffix: Option<&str>) -> Result<()> {
        match label_suffix {
            Some(suffix) => writeln!(self.out, "    \"{swhid}\" [label=\"{swhid}\\n{suffix}\"];"),
            None => writeln!(self.out, "    \"{swhid}\";"),
        }
    }

    pub fn write_edge(&mut self, src: &ExtendedSwhid, tgt: &ExtendedSwhid) -> Result<()> {
        writeln!(self.out, "    \"{src}\" -> \"{tgt}\";")
    }

    pub fn write_footer(&mut self) -> Result<()> {
        writeln!(self.out, "}}")
    }
}
