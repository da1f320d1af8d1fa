//! ABI bindings of the contracts the deploy flow reads from or calls into.
use alloy_sol_types::sol;
use ballot_core::UserOperation;

sol! {
    /// EIP-4337 v0.6 entry point.
    interface IEntryPoint {
        struct UserOperation {
            address sender;
            uint256 nonce;
            bytes initCode;
            bytes callData;
            uint256 callGasLimit;
            uint256 verificationGasLimit;
            uint256 preVerificationGas;
            uint256 maxFeePerGas;
            uint256 maxPriorityFeePerGas;
            bytes paymasterAndData;
            bytes signature;
        }

        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
        function getUserOpHash(UserOperation calldata userOp) external view returns (bytes32);
    }

    /// Nonce accessor exposed by wallets deployed before the entry point kept nonces.
    interface ILegacyNonce {
        function nonces(address sender) external view returns (uint256);
    }

    interface ISmartAccount {
        function execute(address dest, uint256 value, bytes calldata func) external;
    }

    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }

    interface IElectionManager {
        function owner() external view returns (address);
        function createSession(uint256 electionId, uint256 duration, uint256 maxVoters) external returns (uint256 sessionId);
    }
}

impl From<&UserOperation> for IEntryPoint::UserOperation {
    fn from(op: &UserOperation) -> Self {
        Self {
            sender: op.sender,
            nonce: op.nonce,
            initCode: op.init_code.clone(),
            callData: op.call_data.clone(),
            callGasLimit: op.call_gas_limit,
            verificationGasLimit: op.verification_gas_limit,
            preVerificationGas: op.pre_verification_gas,
            maxFeePerGas: op.max_fee_per_gas,
            maxPriorityFeePerGas: op.max_priority_fee_per_gas,
            paymasterAndData: op.paymaster_and_data.clone(),
            signature: op.signature().clone(),
        }
    }
}
