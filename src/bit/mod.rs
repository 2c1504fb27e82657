//! Bit-level stream I/O shared by the FSE, Huffman, and Brotli codecs.
//!
//! Zstandard writes two different bit orders depending on the stream:
//! sequence/Huffman bitstreams are written forward but read backward
//! (the encoder appends a `1` sentinel bit after the last symbol, then
//! the decoder starts from the end of the buffer and reads toward the
//! front: see [`reverse_reader::BitReaderReversed`]), while FSE table
//! descriptions and Brotli's own bitstream are read forward, LSB-first
//! within each byte ([`forward_reader::BitReader`]). [`writer::BitWriter`]
//! produces the latter and, via [`writer::BitWriter::close_with_terminator`],
//! can also close out a stream meant to be read in reverse.

pub mod forward_reader;
pub mod reverse_reader;
pub mod writer;
