use quick_error::quick_error;

quick_error! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum MemoryError {
        OutOfRange(addr: u32) {
            display("linear address 0x{:06X} is outside the memory image", addr)
        }
    }
}

/// flat byte store backing the emulated address space, sized by the loader
/// to cover the code image and the initial stack
#[derive(Clone, Default)]
pub struct FlatMemory {
    pub memory: Vec<u8>,
}

impl FlatMemory {
    pub fn with_size(size: usize) -> Self {
        FlatMemory { memory: vec![0u8; size] }
    }

    pub fn from_vec(memory: Vec<u8>) -> Self {
        FlatMemory { memory }
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, MemoryError> {
        match self.memory.get(addr as usize) {
            Some(v) => Ok(*v),
            None => Err(MemoryError::OutOfRange(addr)),
        }
    }

    pub fn read_u16(&self, addr: u32) -> Result<u16, MemoryError> {
        let lo = self.read_u8(addr)?;
        let hi = self.read_u8(addr + 1)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    pub fn write_u8(&mut self, addr: u32, data: u8) -> Result<(), MemoryError> {
        match self.memory.get_mut(addr as usize) {
            Some(v) => {
                *v = data;
                Ok(())
            }
            None => Err(MemoryError::OutOfRange(addr)),
        }
    }

    pub fn write_u16(&mut self, addr: u32, data: u16) -> Result<(), MemoryError> {
        self.write_u8(addr, data as u8)?;
        self.write_u8(addr + 1, (data >> 8) as u8)
    }

    pub fn read(&self, addr: u32, length: usize) -> Result<&[u8], MemoryError> {
        let start = addr as usize;
        self.memory
            .get(start..start + length)
            .ok_or_else(|| MemoryError::OutOfRange(addr + length.saturating_sub(1) as u32))
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        let start = addr as usize;
        match self.memory.get_mut(start..start + data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                Ok(())
            }
            None => Err(MemoryError::OutOfRange(addr + data.len().saturating_sub(1) as u32)),
        }
    }
}
