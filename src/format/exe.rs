use bincode::deserialize;
use quick_error::quick_error;

#[cfg(test)]
#[path = "./exe_test.rs"]
mod exe_test;

/// the documented part of the MZ header: 14 little-endian words
pub const HEADER_SIZE: usize = 28;

pub const PARAGRAPH_SIZE: usize = 16;

const PAGE_SIZE: usize = 512;

quick_error! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum LoaderError {
        BadSignature {
            display("missing MZ signature")
        }
        TruncatedHeader {
            display("stream ends inside the MZ header")
        }
        TruncatedRelocationTable {
            display("stream ends inside the relocation table")
        }
        TruncatedImage {
            display("stream ends before the code image starts")
        }
        RelocationOutOfRange(addr: u32) {
            display("relocation target 0x{:06X} is outside the image", addr)
        }
    }
}

/// http://www.delorie.com/djgpp/doc/exe/
#[derive(Deserialize, Debug)]
pub struct ExeHeader {
    /// magic number "MZ"
    pub signature: [u8; 2],

    /// number of bytes used in the last 512-byte page of the file
    pub bytes_in_last_page: u16,

    /// total number of 512-byte pages, including any partial last page
    pub pages: u16,

    /// number of relocation entries
    pub relocations: u16,

    /// header size in paragraphs; the code image starts right after
    pub header_paragraphs: u16,

    /// minimum paragraphs of memory required beyond the image
    pub min_extra_paragraphs: u16,

    /// maximum paragraphs to allocate beyond the image
    pub max_extra_paragraphs: u16,

    /// initial SS, relative to the segment the program is loaded at
    pub ss: u16,

    /// initial SP
    pub sp: u16,

    /// checksum (usually unset)
    pub checksum: u16,

    /// initial IP
    pub ip: u16,

    /// initial CS, relative to the segment the program is loaded at
    pub cs: u16,

    /// file offset of the relocation table
    pub reloc_table_offset: u16,

    /// overlay number (0 = main program)
    pub overlay_number: u16,
}

#[derive(Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct ExeReloc {
    pub offset: u16,
    pub segment: u16,
}

impl ExeHeader {
    /// total image bytes (header included) declared by the page fields
    pub fn image_size(&self) -> usize {
        let full = self.pages as usize * PAGE_SIZE;
        if self.bytes_in_last_page == 0 {
            full
        } else {
            full.saturating_sub(PAGE_SIZE - self.bytes_in_last_page as usize)
        }
    }

    /// file offset where the code image starts
    pub fn code_offset(&self) -> usize {
        self.header_paragraphs as usize * PARAGRAPH_SIZE
    }
}

/// parsed MZ container: header, relocation table, code image bytes
pub struct ExeFile {
    pub header: ExeHeader,
    pub relocs: Vec<ExeReloc>,
    pub code: Vec<u8>,
}

impl ExeFile {
    pub fn from_data(data: &[u8]) -> Result<ExeFile, LoaderError> {
        if data.len() < HEADER_SIZE {
            return Err(LoaderError::TruncatedHeader);
        }
        let header: ExeHeader = deserialize(data).map_err(|_| LoaderError::TruncatedHeader)?;
        if &header.signature != b"MZ" {
            return Err(LoaderError::BadSignature);
        }

        // one entry at a time: bincode length-prefixes sequences, the
        // on-disk table is raw (offset, segment) pairs
        let table = header.reloc_table_offset as usize;
        let mut relocs = Vec::with_capacity(header.relocations as usize);
        for i in 0..header.relocations as usize {
            let entry = table + i * 4;
            let raw = data
                .get(entry..entry + 4)
                .ok_or(LoaderError::TruncatedRelocationTable)?;
            let reloc: ExeReloc =
                deserialize(raw).map_err(|_| LoaderError::TruncatedRelocationTable)?;
            relocs.push(reloc);
        }

        let code_start = header.code_offset();
        if code_start > data.len() {
            return Err(LoaderError::TruncatedImage);
        }
        // only a stream padded out to full pages carries the tail the page
        // fields describe; unpadded files in the wild rarely agree with
        // their declared image size, so those are taken as-is
        let padded = header.pages as usize * PAGE_SIZE;
        let code_end = if data.len() >= padded && padded > 0 {
            header.image_size().max(code_start).min(data.len())
        } else {
            data.len()
        };
        let code = data[code_start..code_end].to_vec();

        Ok(ExeFile { header, relocs, code })
    }

    pub fn print_details(&self) {
        let h = &self.header;
        println!("bytes in last page   {:6}", h.bytes_in_last_page);
        println!("pages in file        {:6}", h.pages);
        println!("relocations          {:6}", h.relocations);
        println!("header paragraphs    {:6}", h.header_paragraphs);
        println!("min extra paragraphs {:6}", h.min_extra_paragraphs);
        println!("max extra paragraphs {:6}", h.max_extra_paragraphs);
        println!("initial ss:sp     {:04X}:{:04X}", h.ss, h.sp);
        println!("initial cs:ip     {:04X}:{:04X}", h.cs, h.ip);
        println!("reloc table offset   0x{:04X}", h.reloc_table_offset);
        println!("overlay number       {:6}", h.overlay_number);
        println!("code image           {:6} bytes", self.code.len());
    }
}
