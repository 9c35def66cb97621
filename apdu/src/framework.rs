// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Framework APDUs, used to resume suspended commands

use encdec::Encode;

use crate::{
    check_len, ApduError, ApduHeader, ApduReq, FrameworkInstruction, FRAMEWORK_APDU_CLA,
};

/// Continue an interrupted command with the answer to a client command
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ContinueReq<'a> {
    pub data: &'a [u8],
}

impl<'a> ContinueReq<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> ApduReq for ContinueReq<'a> {
    fn header(&self) -> ApduHeader {
        ApduHeader::new(
            FRAMEWORK_APDU_CLA,
            FrameworkInstruction::ContinueInterrupted as u8,
        )
    }
}

impl<'a> Encode for ContinueReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.data.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, self.data.len())?;
        buff[..self.data.len()].copy_from_slice(self.data);
        Ok(self.data.len())
    }
}
