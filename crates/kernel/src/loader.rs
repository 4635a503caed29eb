use types::VirtualAddress;

/// One loadable segment of a program image. `mem_size` may exceed
/// `data.len()`; the remainder is zero-filled.
///
/// Segments must not share a page: loading maps whole pages, so a page
/// straddled by two segments would be mapped twice and the first frame
/// stranded.
#[derive(Clone, Copy, Debug)]
pub struct Segment<'a> {
    pub va: VirtualAddress,
    pub mem_size: usize,
    pub data: &'a [u8],
    pub writable: bool,
}

/// A loadable program, consumed purely as a forward iterator of
/// segments. Image-format parsing lives outside the kernel.
pub trait ProgramImage {
    fn entry(&self) -> VirtualAddress;
    fn segments(&self) -> Box<dyn Iterator<Item = Segment<'_>> + '_>;
}

#[derive(Clone, Debug)]
struct OwnedSegment {
    va: VirtualAddress,
    mem_size: usize,
    data: Vec<u8>,
    writable: bool,
}

/// In-memory program image, the hosted stand-in for the boot-time
/// program set.
#[derive(Clone, Debug, Default)]
pub struct StaticImage {
    entry: VirtualAddress,
    segments: Vec<OwnedSegment>,
}

impl StaticImage {
    pub fn new(entry: VirtualAddress) -> Self {
        Self {
            entry,
            segments: Vec::new(),
        }
    }

    pub fn segment(
        mut self,
        va: VirtualAddress,
        mem_size: usize,
        data: &[u8],
        writable: bool,
    ) -> Self {
        assert!(data.len() <= mem_size, "segment data larger than mem_size");
        self.segments.push(OwnedSegment {
            va,
            mem_size,
            data: data.to_vec(),
            writable,
        });
        self
    }
}

impl ProgramImage for StaticImage {
    fn entry(&self) -> VirtualAddress {
        self.entry
    }

    fn segments(&self) -> Box<dyn Iterator<Item = Segment<'_>> + '_> {
        Box::new(self.segments.iter().map(|s| Segment {
            va: s.va,
            mem_size: s.mem_size,
            data: &s.data,
            writable: s.writable,
        }))
    }
}
